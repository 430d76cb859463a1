//! Shared handles passed to every view, plus the catalog queries views build.

use std::time::Duration;

use crate::cache::{AnyStorage, CacheResult};
use crate::catalog::{cache as tags, Book, BorrowSummary, CatalogError, CatalogStore};
use crate::config::Config;
use crate::query::Query;

use super::notification::Notifier;

pub type Store = CatalogStore<AnyStorage>;

#[derive(Clone)]
pub struct ViewContext {
  pub store: Store,
  pub notifier: Notifier,
  poll_interval: Option<Duration>,
  refetch_on_focus: bool,
  refetch_on_reconnect: bool,
}

impl ViewContext {
  pub fn new(store: Store, notifier: Notifier, config: &Config) -> Self {
    Self {
      store,
      notifier,
      poll_interval: config.poll_interval(),
      refetch_on_focus: config.polling.refetch_on_focus,
      refetch_on_reconnect: config.polling.refetch_on_reconnect,
    }
  }

  fn configure<T: Send + 'static>(&self, query: Query<T>) -> Query<T> {
    query
      .refetch_on_focus(self.refetch_on_focus)
      .refetch_on_reconnect(self.refetch_on_reconnect)
  }

  /// Lists refresh in the background at the configured interval
  fn polled<T: Send + 'static>(&self, query: Query<T>) -> Query<T> {
    match self.poll_interval {
      Some(interval) => query.with_refetch_interval(interval),
      None => query,
    }
  }

  /// The whole catalog, following every book write.
  pub fn book_list_query(&self) -> Query<Vec<Book>> {
    let store = self.store.clone();
    let peek_store = self.store.clone();
    let query = Query::from_cache(move |policy| {
      let store = store.clone();
      async move { store.list_books(policy).await.map_err(|e| e.to_string()) }
    })
    .subscribe(self.store.cache().subscribe(), vec![tags::book_list()])
    .with_peek(move || peek_store.cached_books().ok().flatten());
    self.configure(self.polled(query))
  }

  /// A single book. `None` once the service reports it missing.
  pub fn book_query(&self, id: &str) -> Query<Option<Book>> {
    let store = self.store.clone();
    let peek_store = self.store.clone();
    let fetch_id = id.to_string();
    let peek_id = id.to_string();
    let query = Query::from_cache(move |policy| {
      let store = store.clone();
      let id = fetch_id.clone();
      async move {
        match store.get_book(&id, policy).await {
          Ok(result) => Ok(result.map(Some)),
          Err(CatalogError::NotFound(_)) => Ok(CacheResult::from_network(None)),
          Err(e) => Err(e.to_string()),
        }
      }
    })
    .subscribe(self.store.cache().subscribe(), vec![tags::book(id)])
    .with_peek(move || peek_store.cached_book(&peek_id).ok().flatten().map(Some));
    self.configure(query)
  }

  /// Borrow report, polled like the book list.
  pub fn summary_query(&self) -> Query<Vec<BorrowSummary>> {
    let store = self.store.clone();
    let peek_store = self.store.clone();
    let query = Query::from_cache(move |policy| {
      let store = store.clone();
      async move { store.borrow_summary(policy).await.map_err(|e| e.to_string()) }
    })
    .subscribe(self.store.cache().subscribe(), vec![tags::summary_list()])
    .with_peek(move || peek_store.cached_summary().ok().flatten());
    self.configure(self.polled(query))
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use super::*;
  use crate::cache::{AnyStorage, CacheLayer, MemoryStorage};
  use crate::catalog::fake::FakeCatalog;
  use crate::ui::notification::Notification;
  use std::sync::Arc;
  use tokio::sync::mpsc;

  pub type Harness = (
    ViewContext,
    Arc<FakeCatalog>,
    mpsc::UnboundedReceiver<Notification>,
  );

  /// Context over an in-memory fake service.
  pub fn context(books: Vec<Book>) -> Harness {
    context_with(books, false)
  }

  /// Like `context`, but failed reads fall back to the last cached value.
  pub fn offline_context(books: Vec<Book>) -> Harness {
    context_with(books, true)
  }

  fn context_with(books: Vec<Book>, offline_fallback: bool) -> Harness {
    let fake = Arc::new(FakeCatalog::with_books(books));
    let cache = CacheLayer::new(AnyStorage::Memory(MemoryStorage::new()))
      .with_offline_fallback(offline_fallback);
    let store = CatalogStore::new(fake.clone(), cache);
    let (notifier, rx) = Notifier::channel();
    let ctx = ViewContext::new(store, notifier, &Config::default());
    (ctx, fake, rx)
  }
}

#[cfg(test)]
mod tests {
  use super::testing::context;
  use super::*;
  use crate::catalog::types::fixtures::book;

  #[tokio::test]
  async fn test_book_query_reports_missing_book() {
    let (ctx, _fake, _rx) = context(vec![book("1", "Emma", 2)]);
    let mut query = ctx.book_query("404");
    query.fetch();
    tokio::time::sleep(Duration::from_millis(20)).await;
    query.tick();
    assert_eq!(query.data(), Some(&None));
  }

  #[tokio::test]
  async fn test_list_query_follows_optimistic_delete() {
    let (ctx, _fake, _rx) = context(vec![book("1", "Emma", 2), book("2", "Persuasion", 1)]);
    let mut query = ctx.book_list_query();
    query.fetch();
    tokio::time::sleep(Duration::from_millis(20)).await;
    query.tick();
    assert_eq!(query.data().map(Vec::len), Some(2));

    ctx.store.delete_book("1").await.unwrap();
    query.tick();
    tokio::time::sleep(Duration::from_millis(20)).await;
    query.tick();
    let ids: Vec<_> = query.data().unwrap().iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["2"]);
  }
}
