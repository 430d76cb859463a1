//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::error::CacheError;
use super::storage::CacheStorage;
use super::tags::Tag;
use super::traits::{CacheEvent, CacheResult, Cacheable, FetchPolicy};

/// Capacity of the cache event channel. Slow subscribers that fall further
/// behind see a `Lagged` error and should treat it as a full invalidation.
const EVENT_CAPACITY: usize = 64;

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the application and the network client. Reads go
/// through `fetch_list` / `fetch_one`; mutations mark entries stale with
/// `invalidate`, which also tells every subscriber to refetch.
pub struct CacheLayer<S: CacheStorage> {
  pub(super) storage: Arc<S>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// Serve stale entries when the network is unavailable
  offline_fallback: bool,
  events: broadcast::Sender<CacheEvent>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      storage: Arc::new(storage),
      stale_time: Duration::minutes(5),
      offline_fallback: false,
      events,
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Serve the last known value when a fetch fails.
  pub fn with_offline_fallback(mut self, enabled: bool) -> Self {
    self.offline_fallback = enabled;
    self
  }

  /// Subscribe to invalidation and update events.
  pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
    self.events.subscribe()
  }

  /// Broadcast an event. Having no subscribers is not an error.
  pub fn notify(&self, event: CacheEvent) {
    tracing::trace!(?event, "cache event");
    let _ = self.events.send(event);
  }

  /// Check if cached data is too old to be served without a refetch.
  fn is_expired(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at > self.stale_time
  }

  /// Fetch a list.
  ///
  /// 1. With `CacheFirst`, a fresh, non-invalidated entry is returned as is
  /// 2. Otherwise fetch from network and replace the entry
  /// 3. On network failure the entry is left untouched and the error is
  ///    returned, or the stale entry is served when offline fallback is on
  pub async fn fetch_list<T, E, F, Fut>(
    &self,
    tag: &Tag,
    policy: FetchPolicy,
    fetcher: F,
  ) -> Result<CacheResult<Vec<T>>, E>
  where
    T: Cacheable,
    E: From<CacheError> + std::fmt::Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
  {
    let cached = self.storage.get_query_result::<T>(tag)?;

    if policy == FetchPolicy::CacheFirst {
      if let Some(cached) = &cached {
        if !cached.stale && !self.is_expired(cached.cached_at) {
          return Ok(CacheResult::from_cache(
            cached.entities.clone(),
            cached.cached_at,
          ));
        }
      }
    }

    match fetcher().await {
      Ok(data) => {
        self.storage.store_query_result(tag, &data)?;
        self.notify(CacheEvent::Updated(vec![tag.clone()]));
        Ok(CacheResult::from_network(data))
      }
      Err(e) => match cached {
        Some(cached) if self.offline_fallback => {
          tracing::warn!(%tag, error = %e, "fetch failed, serving cached list");
          Ok(CacheResult::offline(cached.entities, cached.cached_at))
        }
        _ => Err(e),
      },
    }
  }

  /// Fetch a single entity with caching. Same policy as `fetch_list`.
  pub async fn fetch_one<T, E, F, Fut>(
    &self,
    entity_key: &str,
    policy: FetchPolicy,
    fetcher: F,
  ) -> Result<CacheResult<T>, E>
  where
    T: Cacheable,
    E: From<CacheError> + std::fmt::Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let cached = self.storage.get_entity::<T>(entity_key)?;

    if policy == FetchPolicy::CacheFirst {
      if let Some(cached) = &cached {
        if !cached.stale && !self.is_expired(cached.cached_at) {
          return Ok(CacheResult::from_cache(
            cached.entity.clone(),
            cached.cached_at,
          ));
        }
      }
    }

    match fetcher().await {
      Ok(data) => {
        self.storage.store_entity(&data)?;
        self.notify(CacheEvent::Updated(vec![data.tag()]));
        Ok(CacheResult::from_network(data))
      }
      Err(e) => match cached {
        Some(cached) if self.offline_fallback => {
          tracing::warn!(entity_key, error = %e, "fetch failed, serving cached entity");
          Ok(CacheResult::offline(cached.entity, cached.cached_at))
        }
        _ => Err(e),
      },
    }
  }

  /// Read a cached list without touching the network.
  pub fn peek_list<T: Cacheable>(&self, tag: &Tag) -> Result<Option<Vec<T>>, CacheError> {
    Ok(
      self
        .storage
        .get_query_result::<T>(tag)?
        .map(|cached| cached.entities),
    )
  }

  /// Read a cached entity without touching the network.
  pub fn peek_one<T: Cacheable>(&self, entity_key: &str) -> Result<Option<T>, CacheError> {
    Ok(
      self
        .storage
        .get_entity::<T>(entity_key)?
        .map(|cached| cached.entity),
    )
  }

  /// Store a single entity, e.g. one returned by a mutation.
  pub fn put_one<T: Cacheable>(&self, entity: &T) -> Result<(), CacheError> {
    self.storage.store_entity(entity)?;
    self.notify(CacheEvent::Updated(vec![entity.tag()]));
    Ok(())
  }

  /// Drop a single entity.
  pub fn remove(&self, entity_type: &'static str, entity_key: &str) -> Result<(), CacheError> {
    self.storage.remove_entity(entity_type, entity_key)
  }

  /// Mark entries stale and tell subscribers to refetch.
  pub fn invalidate(&self, tags: &[Tag]) -> Result<(), CacheError> {
    for tag in tags {
      self.storage.invalidate(tag)?;
    }
    tracing::debug!(tags = ?tags.iter().map(Tag::to_string).collect::<Vec<_>>(), "invalidated");
    self.notify(CacheEvent::Invalidated(tags.to_vec()));
    Ok(())
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
      offline_fallback: self.offline_fallback,
      events: self.events.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryStorage;
  use crate::cache::CacheSource;
  use serde::{Deserialize, Serialize};
  use std::sync::atomic::{AtomicU32, Ordering};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: String,
  }

  impl Cacheable for Item {
    fn cache_key(&self) -> String {
      self.id.clone()
    }

    fn entity_type() -> &'static str {
      "item"
    }
  }

  #[derive(Debug, thiserror::Error)]
  enum TestError {
    #[error("offline")]
    Offline,
    #[error(transparent)]
    Cache(#[from] CacheError),
  }

  fn item(id: &str) -> Item {
    Item { id: id.to_string() }
  }

  #[tokio::test]
  async fn test_cache_first_skips_network_when_fresh() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let tag = Tag::list("item");
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
      layer
        .fetch_list(&tag, FetchPolicy::CacheFirst, || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok::<_, TestError>(vec![item("1")])
        })
        .await
        .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let tag = Tag::list("item");

    layer
      .fetch_list(&tag, FetchPolicy::CacheFirst, || async {
        Ok::<_, TestError>(vec![item("1")])
      })
      .await
      .unwrap();

    layer.invalidate(&[tag.clone()]).unwrap();

    let result = layer
      .fetch_list(&tag, FetchPolicy::CacheFirst, || async {
        Ok::<_, TestError>(vec![item("1"), item("2")])
      })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.len(), 2);
  }

  #[tokio::test]
  async fn test_failed_fetch_leaves_entry_untouched() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let tag = Tag::list("item");

    layer
      .fetch_list(&tag, FetchPolicy::NetworkOnly, || async {
        Ok::<_, TestError>(vec![item("1")])
      })
      .await
      .unwrap();

    let result = layer
      .fetch_list::<Item, _, _, _>(&tag, FetchPolicy::NetworkOnly, || async {
        Err(TestError::Offline)
      })
      .await;

    assert!(matches!(result, Err(TestError::Offline)));
    assert_eq!(layer.peek_list::<Item>(&tag).unwrap(), Some(vec![item("1")]));
  }

  #[tokio::test]
  async fn test_offline_fallback_serves_cached() {
    let layer = CacheLayer::new(MemoryStorage::new()).with_offline_fallback(true);

    layer
      .fetch_one("1", FetchPolicy::NetworkOnly, || async {
        Ok::<_, TestError>(item("1"))
      })
      .await
      .unwrap();

    let result = layer
      .fetch_one::<Item, _, _, _>("1", FetchPolicy::NetworkOnly, || async {
        Err(TestError::Offline)
      })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data, item("1"));
  }

  #[tokio::test]
  async fn test_invalidate_broadcasts() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let mut rx = layer.subscribe();

    layer.invalidate(&[Tag::id("item", "1")]).unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event, CacheEvent::Invalidated(vec![Tag::id("item", "1")]));
    assert!(event.touches(&[Tag::list("item")]));
  }
}
