mod app;
mod backend;
mod cache;
mod commands;
mod config;
mod dashboard;
mod event;
mod logging;
mod query;
mod sync;
mod ui;

use backend::{RealtimeClient, RestClient};
use cache::DateRange;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use color_eyre::Result;
use dashboard::{DashboardClient, DashboardSettings};
use std::path::PathBuf;
use std::sync::Arc;
use sync::ChannelRegistry;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "claimdesk")]
#[command(about = "A terminal back-office for marketplace orders, claims and claim chat")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/claimdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// First day of the analytics range (YYYY-MM-DD)
  #[arg(long, value_parser = cache::range::parse_date)]
  from: Option<NaiveDate>,

  /// Last day of the analytics range (YYYY-MM-DD), defaults to today
  #[arg(long, value_parser = cache::range::parse_date)]
  to: Option<NaiveDate>,

  /// Always go to the network for range data
  #[arg(long)]
  no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(config.log_level.as_deref().unwrap_or("info"))?;

  let today = Utc::now().date_naive();
  let end = args.to.unwrap_or(today);
  let range = match args.from {
    Some(start) => DateRange::new(start, end)?,
    None => DateRange::last_days(end, config.analytics.default_days),
  };
  info!(%range, no_cache = args.no_cache, "starting claimdesk");

  let api = Arc::new(RestClient::new(&config)?);
  let realtime = Arc::new(RealtimeClient::spawn(&config)?);
  let registry = Arc::new(ChannelRegistry::new(realtime));
  let client = DashboardClient::new(api, DashboardSettings::from_config(&config, args.no_cache));

  // Initialize and run the app
  let events = event::EventHandler::new();
  let mut app = app::App::new(config, client, registry, events.sender(), range);
  app.run(events).await?;

  Ok(())
}
