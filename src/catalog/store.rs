//! Catalog operations on top of the cache layer.
//!
//! Reads go through `CacheLayer::fetch_*`. Writes patch the cached book list
//! before the request is sent and undo the patch if it fails; on success the
//! affected tags are invalidated so subscribed queries refetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::{CacheEvent, CacheLayer, CacheResult, CacheStorage, FetchPolicy};

use super::cache::{self as tags, BOOK};
use super::client::CatalogApi;
use super::error::Result;
use super::types::{
  number_rows, Book, BookDraft, BookPatch, BorrowRecord, BorrowRequest, BorrowSummary,
};
use super::validation::{validate_borrow, validate_draft, validate_patch};

pub struct CatalogStore<S: CacheStorage> {
  api: Arc<dyn CatalogApi>,
  cache: CacheLayer<S>,
  /// False after a transport failure until the next request gets through
  online: Arc<AtomicBool>,
}

impl<S: CacheStorage> Clone for CatalogStore<S> {
  fn clone(&self) -> Self {
    Self {
      api: Arc::clone(&self.api),
      cache: self.cache.clone(),
      online: Arc::clone(&self.online),
    }
  }
}

impl<S: CacheStorage> CatalogStore<S> {
  pub fn new(api: Arc<dyn CatalogApi>, cache: CacheLayer<S>) -> Self {
    Self {
      api,
      cache,
      online: Arc::new(AtomicBool::new(true)),
    }
  }

  pub fn cache(&self) -> &CacheLayer<S> {
    &self.cache
  }

  pub fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }

  /// Record connectivity from a request outcome.
  ///
  /// Any response from the server, even an error status, counts as online.
  fn track<T>(&self, result: Result<T>) -> Result<T> {
    match &result {
      Err(e) if e.is_transport() => {
        if self.online.swap(false, Ordering::SeqCst) {
          tracing::warn!(error = %e, "catalog service unreachable");
        }
      }
      _ => {
        if !self.online.swap(true, Ordering::SeqCst) {
          tracing::info!("catalog service reachable again");
          self.cache.notify(CacheEvent::Reconnected);
        }
      }
    }
    result
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  pub async fn list_books(&self, policy: FetchPolicy) -> Result<CacheResult<Vec<Book>>> {
    self
      .cache
      .fetch_list(&tags::book_list(), policy, move || async move {
        self.track(self.api.list_books().await)
      })
      .await
  }

  pub async fn get_book(&self, id: &str, policy: FetchPolicy) -> Result<CacheResult<Book>> {
    self
      .cache
      .fetch_one(id, policy, move || async move {
        self.track(self.api.get_book(id).await)
      })
      .await
  }

  pub async fn borrow_summary(
    &self,
    policy: FetchPolicy,
  ) -> Result<CacheResult<Vec<BorrowSummary>>> {
    self
      .cache
      .fetch_list(&tags::summary_list(), policy, move || async move {
        self.track(self.api.borrow_summary().await).map(number_rows)
      })
      .await
  }

  /// Last known book list, without touching the network.
  pub fn cached_books(&self) -> Result<Option<Vec<Book>>> {
    Ok(self.cache.peek_list::<Book>(&tags::book_list())?)
  }

  /// Last known copy of a book, without touching the network.
  pub fn cached_book(&self, id: &str) -> Result<Option<Book>> {
    Ok(self.cache.peek_one::<Book>(id)?)
  }

  pub fn cached_summary(&self) -> Result<Option<Vec<BorrowSummary>>> {
    Ok(self.cache.peek_list::<BorrowSummary>(&tags::summary_list())?)
  }

  // ==========================================================================
  // Mutations
  // ==========================================================================

  /// Create a book. The id is assigned by the server, so nothing is
  /// patched until the response arrives.
  pub async fn create_book(&self, draft: BookDraft) -> Result<Book> {
    validate_draft(&draft)?;

    let book = self.track(self.api.create_book(&draft).await)?;
    tracing::info!(id = %book.id, title = %book.title, "created book");

    let _ = self
      .cache
      .update_query_data::<Book, _>(&tags::book_list(), |books| books.push(book.clone()))?;
    self.cache.put_one(&book)?;
    self.cache.invalidate(&[tags::book_list()])?;
    Ok(book)
  }

  pub async fn update_book(&self, id: &str, patch: BookPatch) -> Result<()> {
    validate_patch(&patch)?;
    if patch.is_empty() {
      return Ok(());
    }

    let updated = self
      .cache
      .optimistic::<Book, _, _, _, _>(
        &tags::book_list(),
        |books| {
          if let Some(book) = books.iter_mut().find(|b| b.id == id) {
            patch.apply_to(book);
          }
        },
        async { self.track(self.api.update_book(id, &patch).await) },
      )
      .await?;
    tracing::info!(id, "updated book");

    if let Some(book) = updated {
      self.cache.put_one(&book)?;
    }
    self.cache.invalidate(&tags::book_write(id))?;
    Ok(())
  }

  pub async fn delete_book(&self, id: &str) -> Result<()> {
    self
      .cache
      .optimistic::<Book, _, _, _, _>(
        &tags::book_list(),
        |books| books.retain(|b| b.id != id),
        async { self.track(self.api.delete_book(id).await) },
      )
      .await?;
    tracing::info!(id, "deleted book");

    self.cache.remove(BOOK, id)?;
    self.cache.invalidate(&tags::book_write(id))?;
    Ok(())
  }

  /// Borrow copies of a book.
  ///
  /// Rejected without a request when the cached book has fewer copies than
  /// asked for. The server has the final say either way.
  pub async fn borrow_book(&self, request: BorrowRequest) -> Result<BorrowRecord> {
    let known_copies = self.cached_book(&request.book)?.map(|b| b.copies());
    validate_borrow(&request, known_copies)?;

    let id = request.book.as_str();
    let record = self
      .cache
      .optimistic::<Book, _, _, _, _>(
        &tags::book_list(),
        |books| {
          if let Some(book) = books.iter_mut().find(|b| b.id == id) {
            book.take_copies(request.quantity);
          }
        },
        async { self.track(self.api.borrow_book(&request).await) },
      )
      .await?;
    tracing::info!(id, quantity = request.quantity, due = %request.due_date, "borrowed book");

    self.cache.invalidate(&tags::borrow_write(id))?;
    Ok(record)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, MemoryStorage};
  use crate::catalog::error::CatalogError;
  use crate::catalog::fake::{FakeCatalog, Failure};
  use crate::catalog::types::fixtures::{book, draft};
  use crate::catalog::types::total_borrowed;
  use chrono::NaiveDate;
  use std::sync::atomic::Ordering;

  fn store_with(books: Vec<Book>) -> (CatalogStore<MemoryStorage>, Arc<FakeCatalog>) {
    let fake = Arc::new(FakeCatalog::with_books(books));
    let store = CatalogStore::new(fake.clone(), CacheLayer::new(MemoryStorage::new()));
    (store, fake)
  }

  async fn loaded(books: Vec<Book>) -> (CatalogStore<MemoryStorage>, Arc<FakeCatalog>) {
    let (store, fake) = store_with(books);
    store.list_books(FetchPolicy::CacheFirst).await.unwrap();
    (store, fake)
  }

  fn borrow(id: &str, quantity: u32) -> BorrowRequest {
    BorrowRequest {
      book: id.to_string(),
      quantity,
      due_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
    }
  }

  fn drain(rx: &mut tokio::sync::broadcast::Receiver<CacheEvent>) -> Vec<CacheEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
      events.push(event);
    }
    events
  }

  #[tokio::test]
  async fn test_list_is_served_from_cache() {
    let (store, fake) = loaded(vec![book("1", "Emma", 1)]).await;

    let second = store.list_books(FetchPolicy::CacheFirst).await.unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 1);

    let forced = store.list_books(FetchPolicy::NetworkOnly).await.unwrap();
    assert_eq!(forced.source, CacheSource::Network);
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_create_pushes_server_book_and_invalidates() {
    let (store, _fake) = loaded(vec![book("1", "Emma", 1)]).await;
    let mut rx = store.cache().subscribe();

    let created = store.create_book(draft("Persuasion", 2)).await.unwrap();
    assert!(created.is_available());

    let cached = store.cached_books().unwrap().unwrap();
    assert_eq!(cached.len(), 2);
    assert_eq!(cached[1].id, created.id);
    assert!(drain(&mut rx).contains(&CacheEvent::Invalidated(vec![tags::book_list()])));
  }

  #[tokio::test]
  async fn test_invalid_draft_is_not_sent() {
    let (store, fake) = loaded(vec![]).await;

    let err = store.create_book(draft("", 0)).await.unwrap_err();
    let errors = err.validation().unwrap();
    assert!(errors.get("title").is_some());
    assert!(errors.get("copies").is_some());
    assert_eq!(fake.write_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_update_recomputes_availability() {
    let (store, fake) = loaded(vec![book("1", "Emma", 2)]).await;

    let patch = BookPatch {
      copies: Some(0),
      ..Default::default()
    };
    store.update_book("1", patch).await.unwrap();

    let cached = store.cached_book("1").unwrap().unwrap();
    assert_eq!(cached.copies(), 0);
    assert!(!cached.is_available());
    assert!(!fake.book("1").unwrap().is_available());
  }

  #[tokio::test]
  async fn test_failed_update_restores_snapshot() {
    let (store, fake) = loaded(vec![book("1", "Emma", 2), book("2", "Dune", 0)]).await;
    let before = store.cached_books().unwrap().unwrap();
    fake.fail(Failure::Broken);

    let patch = BookPatch {
      title: Some("Emma, revised".to_string()),
      ..Default::default()
    };
    let err = store.update_book("1", patch).await.unwrap_err();
    assert!(matches!(err, CatalogError::Status { status: 500, .. }));
    assert_eq!(store.cached_books().unwrap().unwrap(), before);
  }

  #[tokio::test]
  async fn test_empty_patch_is_a_noop() {
    let (store, fake) = loaded(vec![book("1", "Emma", 2)]).await;
    store.update_book("1", BookPatch::default()).await.unwrap();
    assert_eq!(fake.write_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_delete_removes_from_next_fetch() {
    let (store, _fake) = loaded(vec![book("1", "Emma", 2), book("2", "Dune", 1)]).await;

    store.delete_book("1").await.unwrap();
    assert!(store.cached_book("1").unwrap().is_none());

    let next = store.list_books(FetchPolicy::CacheFirst).await.unwrap();
    assert_eq!(next.source, CacheSource::Network);
    assert!(next.data.iter().all(|b| b.id != "1"));
  }

  #[tokio::test]
  async fn test_failed_delete_restores_snapshot() {
    let (store, fake) = loaded(vec![book("1", "Emma", 2), book("2", "Dune", 1)]).await;
    let before = store.cached_books().unwrap().unwrap();
    fake.fail(Failure::Down);

    assert!(store.delete_book("1").await.is_err());
    assert_eq!(store.cached_books().unwrap().unwrap(), before);
  }

  #[tokio::test]
  async fn test_borrow_more_than_cached_copies_is_rejected_locally() {
    let (store, fake) = loaded(vec![book("1", "Emma", 2)]).await;

    let err = store.borrow_book(borrow("1", 3)).await.unwrap_err();
    assert!(err.validation().is_some());
    assert_eq!(fake.write_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.cached_book("1").unwrap().unwrap().copies(), 2);
  }

  #[tokio::test]
  async fn test_borrow_decrements_and_invalidates_summary() {
    let (store, _fake) = loaded(vec![book("1", "Emma", 2)]).await;
    store.borrow_summary(FetchPolicy::CacheFirst).await.unwrap();
    let mut rx = store.cache().subscribe();

    let record = store.borrow_book(borrow("1", 2)).await.unwrap();
    assert_eq!(record.book_id, "1");

    let cached = store.cached_book("1").unwrap().unwrap();
    assert_eq!(cached.copies(), 0);
    assert!(!cached.is_available());

    let events = drain(&mut rx);
    assert!(events
      .iter()
      .any(|e| e.touches(&[tags::summary_list()]) && matches!(e, CacheEvent::Invalidated(_))));

    let report = store.borrow_summary(FetchPolicy::CacheFirst).await.unwrap();
    assert_eq!(report.source, CacheSource::Network);
    assert_eq!(report.data[0].total_quantity, 2);
  }

  #[tokio::test]
  async fn test_summary_keeps_rows_sharing_an_isbn() {
    // Both fixtures carry the same ISBN
    let (store, _fake) = loaded(vec![book("1", "Emma", 3), book("2", "Persuasion", 4)]).await;
    store.borrow_book(borrow("1", 3)).await.unwrap();
    store.borrow_book(borrow("2", 4)).await.unwrap();

    let report = store.borrow_summary(FetchPolicy::NetworkOnly).await.unwrap();
    assert_eq!(report.data.len(), 2);

    let cached = store.cached_summary().unwrap().unwrap();
    let rows: Vec<_> = cached
      .iter()
      .map(|r| (r.title.as_str(), r.total_quantity))
      .collect();
    assert_eq!(rows, [("Emma", 3), ("Persuasion", 4)]);
    assert_eq!(total_borrowed(&cached), 7);
  }

  #[tokio::test]
  async fn test_server_rejected_borrow_is_undone() {
    let (store, fake) = loaded(vec![book("1", "Emma", 3)]).await;
    fake.fail(Failure::Broken);

    assert!(store.borrow_book(borrow("1", 1)).await.is_err());
    assert_eq!(store.cached_book("1").unwrap().unwrap().copies(), 3);
  }

  #[tokio::test]
  async fn test_reconnect_is_broadcast() {
    let (store, fake) = store_with(vec![book("1", "Emma", 1)]);
    let mut rx = store.cache().subscribe();

    fake.fail(Failure::Down);
    assert!(store.list_books(FetchPolicy::NetworkOnly).await.is_err());
    assert!(!store.is_online());

    fake.recover();
    store.list_books(FetchPolicy::NetworkOnly).await.unwrap();
    assert!(store.is_online());
    assert!(drain(&mut rx).contains(&CacheEvent::Reconnected));
  }

  #[tokio::test]
  async fn test_read_errors_surface_without_offline_fallback() {
    let (store, fake) = loaded(vec![book("1", "Emma", 1)]).await;
    fake.fail(Failure::Down);

    let err = store.list_books(FetchPolicy::NetworkOnly).await.unwrap_err();
    assert!(err.is_transport());
    // Last known value is still there for the view to keep showing
    assert_eq!(store.cached_books().unwrap().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_offline_fallback_serves_last_known_list() {
    let fake = Arc::new(FakeCatalog::with_books(vec![book("1", "Emma", 1)]));
    let cache = CacheLayer::new(MemoryStorage::new()).with_offline_fallback(true);
    let store = CatalogStore::new(fake.clone(), cache);
    store.list_books(FetchPolicy::CacheFirst).await.unwrap();

    fake.fail(Failure::Down);
    let result = store.list_books(FetchPolicy::NetworkOnly).await.unwrap();
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data.len(), 1);
  }

  #[tokio::test]
  async fn test_get_missing_book() {
    let (store, _fake) = store_with(vec![]);
    let err = store.get_book("404", FetchPolicy::CacheFirst).await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(id) if id == "404"));
  }
}
