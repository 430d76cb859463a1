use thiserror::Error;

/// Failures of the local cache storage.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to (de)serialize cached entity: {0}")]
  Serde(#[from] serde_json::Error),

  #[error("failed to create cache directory: {0}")]
  Io(#[from] std::io::Error),

  #[error("could not determine data directory")]
  NoDataDir,

  #[error("cache lock poisoned")]
  LockPoisoned,

  #[error("failed to parse cached timestamp '{0}'")]
  Timestamp(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
