use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  /// User id of the operator; their own messages never count as notifications
  pub admin_id: String,
  /// Custom title for header (defaults to the backend host if not set)
  pub title: Option<String>,
  /// Log filter used when CLAIMDESK_LOG is not set
  pub log_level: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub realtime: RealtimeConfig,
  #[serde(default)]
  pub analytics: AnalyticsConfig,
  #[serde(default)]
  pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  pub url: String,
  #[serde(default = "default_schema")]
  pub schema: String,
}

fn default_schema() -> String {
  "public".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  pub ttl_secs: i64,
  pub page_size: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_secs: 300,
      page_size: 1000,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
  pub heartbeat_secs: u64,
  /// Reconnect attempts before live channels are reported as failed
  pub reconnect_retries: u32,
  pub reconnect_delay_ms: u64,
  pub reconnect_max_delay_ms: u64,
  /// Quiet period before the last-message index is recomputed
  pub recency_debounce_ms: u64,
}

impl Default for RealtimeConfig {
  fn default() -> Self {
    Self {
      heartbeat_secs: 15,
      reconnect_retries: 3,
      reconnect_delay_ms: 3000,
      reconnect_max_delay_ms: 15000,
      recency_debounce_ms: 500,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
  /// Days shown when no range is given on the command line
  pub default_days: u64,
}

impl Default for AnalyticsConfig {
  fn default() -> Self {
    Self { default_days: 30 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
  pub history_limit: usize,
}

impl Default for NotificationsConfig {
  fn default() -> Self {
    Self { history_limit: 50 }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./claimdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/claimdesk/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/claimdesk/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("claimdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("claimdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the backend service key from environment variables.
  ///
  /// Checks CLAIMDESK_SERVICE_KEY first, then SUPABASE_SERVICE_ROLE_KEY as fallback.
  pub fn get_service_key() -> Result<String> {
    std::env::var("CLAIMDESK_SERVICE_KEY")
      .or_else(|_| std::env::var("SUPABASE_SERVICE_ROLE_KEY"))
      .map_err(|_| {
        eyre!(
          "Backend service key not found. Set CLAIMDESK_SERVICE_KEY or SUPABASE_SERVICE_ROLE_KEY environment variable."
        )
      })
  }

  /// Header title: configured title, else the backend host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.backend.url)
      .ok()
      .and_then(|u| u.host_str().map(str::to_string))
      .unwrap_or_else(|| self.backend.url.clone())
  }
}
