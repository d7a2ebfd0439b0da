use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding a full `EnvFilter` directive.
pub const LOG_ENV: &str = "CLAIMDESK_LOG";

/// Directory for rolling log files; stdout belongs to the terminal UI
pub fn log_dir() -> Option<PathBuf> {
  dirs::data_dir().map(|d| d.join("claimdesk").join("logs"))
}

fn build_env_filter(level: &str) -> EnvFilter {
  let default_level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
  EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
    EnvFilter::builder()
      .with_default_directive(default_level.into())
      .parse_lossy("")
  })
}

/// Install the global subscriber, writing to a daily rolling file.
///
/// The returned guard flushes pending lines on drop and must be held until
/// the program exits.
pub fn init(level: &str) -> Result<WorkerGuard> {
  let dir = log_dir().ok_or_else(|| eyre!("Could not determine data directory for logs"))?;
  std::fs::create_dir_all(&dir)?;

  let appender = tracing_appender::rolling::daily(&dir, "claimdesk.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  fmt::fmt()
    .with_env_filter(build_env_filter(level))
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true)
    .with_thread_ids(false)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}
