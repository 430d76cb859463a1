mod app;
mod cache;
mod catalog;
mod commands;
mod config;
mod event;
mod logging;
mod query;
mod ui;

use cache::{AnyStorage, CacheLayer, MemoryStorage, NoopStorage, SqliteStorage};
use catalog::{CatalogClient, CatalogStore};
use clap::Parser;
use color_eyre::Result;
use config::{CacheBackend, Config};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "shelf")]
#[command(about = "A terminal client for a library catalog service")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/shelf/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Catalog service base URL, e.g. http://localhost:5000/api
  #[arg(short, long)]
  url: Option<String>,

  /// Disable the request cache for this session
  #[arg(long)]
  no_cache: bool,
}

fn open_storage(config: &Config, no_cache: bool) -> Result<AnyStorage> {
  if no_cache {
    return Ok(AnyStorage::Noop(NoopStorage));
  }
  let storage = match config.cache.backend {
    CacheBackend::Memory => AnyStorage::Memory(MemoryStorage::new()),
    CacheBackend::Sqlite => AnyStorage::Sqlite(SqliteStorage::open_default()?),
    CacheBackend::None => AnyStorage::Noop(NoopStorage),
  };
  Ok(storage)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Flushes buffered log lines on drop
  let _log_guard = logging::init()?;

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override URL if specified on command line
  if let Some(url) = args.url {
    config.catalog.url = url;
  }

  tracing::info!(
    url = %config.catalog.url,
    backend = ?config.cache.backend,
    no_cache = args.no_cache,
    "starting shelf"
  );

  let storage = open_storage(&config, args.no_cache)?;
  let cache = CacheLayer::new(storage)
    .with_stale_time(config.stale_time())
    .with_offline_fallback(config.cache.offline_fallback);
  let client = CatalogClient::new(&config.catalog.url, config.timeout())?;
  let store = CatalogStore::new(Arc::new(client), cache);

  // Initialize and run the app
  let mut app = app::App::new(&config, store);
  app.run().await?;

  Ok(())
}
