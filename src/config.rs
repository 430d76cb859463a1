use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Environment variable overriding `catalog.url`
pub const API_URL_ENV: &str = "SHELF_API_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub catalog: CatalogConfig,
  /// Custom title for header (defaults to the service host if not set)
  pub title: Option<String>,
  pub polling: PollingConfig,
  pub cache: CacheConfig,
  pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
  pub url: String,
  pub timeout_secs: u64,
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_API_URL.to_string(),
      timeout_secs: 10,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
  /// Borrow summary refresh interval; 0 disables polling
  pub interval_secs: u64,
  pub refetch_on_focus: bool,
  pub refetch_on_reconnect: bool,
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      interval_secs: 30,
      refetch_on_focus: true,
      refetch_on_reconnect: true,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// Cache lives for the session only
  #[default]
  Memory,
  /// Persist to the SQLite database under the data directory
  Sqlite,
  /// No caching at all
  None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub backend: CacheBackend,
  pub stale_secs: u64,
  /// Serve last known data when the service is unreachable
  pub offline_fallback: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: CacheBackend::default(),
      stale_secs: 300,
      offline_fallback: false,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
  pub timeout_secs: u64,
}

impl Default for NotificationsConfig {
  fn default() -> Self {
    Self { timeout_secs: 4 }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shelf.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shelf/config.yaml
  ///
  /// Without a file the defaults are used. `SHELF_API_URL` overrides the
  /// service URL either way.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      if !url.is_empty() {
        config.catalog.url = url;
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shelf.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shelf").join("config.yaml");
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

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.catalog.timeout_secs.max(1))
  }

  pub fn stale_time(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.cache.stale_secs as i64)
  }

  /// Borrow summary polling interval, `None` when disabled.
  pub fn poll_interval(&self) -> Option<Duration> {
    (self.polling.interval_secs > 0).then(|| Duration::from_secs(self.polling.interval_secs))
  }

  pub fn notification_timeout(&self) -> Duration {
    Duration::from_secs(self.notifications.timeout_secs)
  }

  /// Header title: configured title, else the service host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.catalog.url)
      .ok()
      .and_then(|u| {
        u.host_str().map(|h| match u.port() {
          Some(port) => format!("{h}:{port}"),
          None => h.to_string(),
        })
      })
      .unwrap_or_else(|| self.catalog.url.clone())
  }
}
