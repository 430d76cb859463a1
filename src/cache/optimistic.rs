//! Optimistic updates: patch a cached list before the server answers, keep
//! the patch on success, put the snapshot back on failure.

use std::future::Future;

use super::error::CacheError;
use super::layer::CacheLayer;
use super::storage::CacheStorage;
use super::tags::Tag;
use super::traits::{CacheEvent, Cacheable};

/// Handle returned by `update_query_data`, used to undo the patch.
#[derive(Debug)]
#[must_use = "dropping a patch result makes the change impossible to undo"]
pub struct PatchResult<T> {
  tag: Tag,
  /// Value before the patch; `None` when nothing was cached
  snapshot: Option<Vec<T>>,
  /// Entry was awaiting a refetch when the patch was taken
  stale: bool,
}

impl<T> PatchResult<T> {
  pub fn snapshot(&self) -> Option<&[T]> {
    self.snapshot.as_deref()
  }
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Apply `recipe` to the cached list at `tag`, returning the snapshot.
  ///
  /// A missing entry is left missing; the returned patch then undoes nothing.
  pub fn update_query_data<T, F>(&self, tag: &Tag, recipe: F) -> Result<PatchResult<T>, CacheError>
  where
    T: Cacheable,
    F: FnOnce(&mut Vec<T>),
  {
    let cached = match self.storage.get_query_result::<T>(tag)? {
      Some(cached) => cached,
      None => {
        return Ok(PatchResult {
          tag: tag.clone(),
          snapshot: None,
          stale: false,
        })
      }
    };

    let snapshot = cached.entities.clone();
    let mut draft = cached.entities;
    recipe(&mut draft);

    self.storage.store_query_result(tag, &draft)?;
    if cached.stale {
      // Writing clears the stale flag; a pending refetch must still happen
      self.storage.invalidate(tag)?;
    }
    self.notify(CacheEvent::Updated(vec![tag.clone()]));

    Ok(PatchResult {
      tag: tag.clone(),
      snapshot: Some(snapshot),
      stale: cached.stale,
    })
  }

  /// Restore the exact pre-patch value.
  ///
  /// An entry that was stale before the patch, or was invalidated while the
  /// patch was in place, stays stale.
  pub fn undo<T: Cacheable>(&self, patch: PatchResult<T>) -> Result<(), CacheError> {
    if let Some(snapshot) = patch.snapshot {
      let invalidated_since = self
        .storage
        .get_query_result::<T>(&patch.tag)?
        .is_some_and(|current| current.stale);

      self.storage.store_query_result(&patch.tag, &snapshot)?;
      if patch.stale || invalidated_since {
        self.storage.invalidate(&patch.tag)?;
      }
      self.notify(CacheEvent::Updated(vec![patch.tag]));
    }
    Ok(())
  }

  /// Run `request` with `recipe` applied to the cached list at `tag`.
  ///
  /// The request future is not polled until the patch is in place. On
  /// failure the snapshot is restored before the error is returned; on
  /// success the patched value stays until the caller invalidates it.
  pub async fn optimistic<T, R, E, F, Fut>(
    &self,
    tag: &Tag,
    recipe: F,
    request: Fut,
  ) -> Result<R, E>
  where
    T: Cacheable,
    E: From<CacheError> + std::fmt::Display,
    F: FnOnce(&mut Vec<T>),
    Fut: Future<Output = Result<R, E>>,
  {
    let patch = self.update_query_data(tag, recipe)?;

    match request.await {
      Ok(response) => Ok(response),
      Err(e) => {
        tracing::info!(%tag, error = %e, "request failed, rolling back optimistic update");
        if let Err(undo_err) = self.undo(patch) {
          tracing::warn!(%tag, error = %undo_err, "failed to roll back optimistic update");
        }
        Err(e)
      }
    }
  }
}
