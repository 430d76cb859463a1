//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use super::tags::Tag;

/// Trait for entities that can be cached.
///
/// Implementors provide a unique cache key and the entity type name used to
/// namespace storage and invalidation tags.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this entity (e.g., book id)
  fn cache_key(&self) -> String;

  /// Entity type name for storage organization (e.g., "book", "borrow_summary")
  fn entity_type() -> &'static str;

  /// Tag addressing this single entity
  fn tag(&self) -> Tag {
    Tag::id(Self::entity_type(), self.cache_key())
  }
}

/// Key for a cached query result.
pub trait QueryKey {
  /// Stable, fixed-length storage key
  fn cache_hash(&self) -> String;

  /// Human-readable description, stored alongside the hash for debugging
  fn description(&self) -> String;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at: Some(cached_at),
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      cached_at: self.cached_at,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Offline mode - network unavailable, serving cached data
  Offline,
}

/// How a read should treat an existing cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
  /// Serve a fresh, non-invalidated entry without touching the network
  #[default]
  CacheFirst,
  /// Always hit the network, then store the result
  NetworkOnly,
}

/// Notifications broadcast to cache subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  /// Entries were marked stale; subscribers holding these tags should refetch
  Invalidated(Vec<Tag>),
  /// Cached values changed locally (optimistic patch, undo, or fresh data)
  Updated(Vec<Tag>),
  /// A request succeeded after a transport failure
  Reconnected,
}

impl CacheEvent {
  /// Check whether this event concerns any of the given tags
  pub fn touches(&self, tags: &[Tag]) -> bool {
    match self {
      CacheEvent::Invalidated(changed) | CacheEvent::Updated(changed) => changed
        .iter()
        .any(|changed| tags.iter().any(|tag| tag.covers(changed))),
      CacheEvent::Reconnected => false,
    }
  }
}
