use thiserror::Error;

use super::validation::ValidationErrors;
use crate::cache::CacheError;

/// Errors surfaced by catalog reads and mutations.
#[derive(Debug, Error)]
pub enum CatalogError {
  /// The request never got a response (connection refused, timeout, ...)
  #[error("network error: {0}")]
  Transport(String),

  #[error("server returned {status}: {message}")]
  Status { status: u16, message: String },

  /// 2xx response with `success: false`
  #[error("{0}")]
  Rejected(String),

  #[error("book {0} not found")]
  NotFound(String),

  #[error("{0}")]
  Validation(ValidationErrors),

  #[error("unexpected response: {0}")]
  Decode(String),

  #[error("cache error: {0}")]
  Cache(#[from] CacheError),

  #[error("invalid URL: {0}")]
  Url(#[from] url::ParseError),
}

impl CatalogError {
  /// True when the service could not be reached at all.
  pub fn is_transport(&self) -> bool {
    matches!(self, Self::Transport(_))
  }

  pub fn validation(&self) -> Option<&ValidationErrors> {
    match self {
      Self::Validation(errors) => Some(errors),
      _ => None,
    }
  }
}

impl From<reqwest::Error> for CatalogError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      Self::Decode(e.to_string())
    } else {
      Self::Transport(e.to_string())
    }
  }
}

impl From<ValidationErrors> for CatalogError {
  fn from(errors: ValidationErrors) -> Self {
    Self::Validation(errors)
  }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
