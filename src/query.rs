//! Async query abstraction for data fetching with caching support.
//!
//! Inspired by TanStack Query, this module provides a `Query<T>` type that
//! encapsulates async data fetching, loading states, and error handling,
//! plus a one-shot `Mutation<T, E>` for writes.
//!
//! # Example
//!
//! ```ignore
//! let store = store.clone();
//! let mut query = Query::from_cache(move |policy| {
//!     let store = store.clone();
//!     async move { store.list_books(policy).await.map_err(|e| e.to_string()) }
//! })
//! .with_refetch_interval(Duration::from_secs(30))
//! .subscribe(store.cache().subscribe(), vec![tags::book_list()]);
//!
//! // Start fetching
//! query.fetch();
//!
//! // In event loop tick
//! if query.tick() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::cache::{CacheEvent, CacheResult, CacheSource, FetchPolicy, Tag};

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// First fetch in progress, nothing to show yet
  Loading,
  /// Data available. A background refetch may be running.
  Success(T),
  /// Query failed with nothing to show
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A factory function that creates futures for fetching data.
///
/// The first fetch may be served from cache; every refetch goes to the network.
type FetcherFn<T> =
  Box<dyn Fn(FetchPolicy) -> BoxFuture<'static, Result<CacheResult<T>, String>> + Send + Sync>;

/// Reads the last known value straight from the cache
type PeekFn<T> = Box<dyn Fn() -> Option<T> + Send + Sync>;

struct Subscription<T> {
  events: broadcast::Receiver<CacheEvent>,
  tags: Vec<Tag>,
  peek: Option<PeekFn<T>>,
}

/// Async query for data fetching with state management.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure)
/// - Loading/success/error states, keeping old data during refetches
/// - Async result handling via channels
/// - Refetch triggers: interval, terminal focus, reconnect, invalidation
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<CacheResult<T>, String>>>,
  fetched_at: Option<Instant>,
  /// Where the data shown came from, and when it was cached
  source: Option<CacheSource>,
  cached_at: Option<DateTime<Utc>>,
  /// Error of the last background refetch, while old data is still shown
  background_error: Option<String>,
  refetch_interval: Option<Duration>,
  refetch_on_focus: bool,
  refetch_on_reconnect: bool,
  subscription: Option<Subscription<T>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It will be called
  /// each time a fetch starts, with `CacheFirst` for the initial fetch and
  /// `NetworkOnly` for refetches.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn(FetchPolicy) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self::from_cache(move |policy| {
      let future = fetcher(policy);
      async move { future.await.map(CacheResult::from_network) }
    })
  }

  /// Like `new`, for fetchers that report where their data came from.
  pub fn from_cache<F, Fut>(fetcher: F) -> Self
  where
    F: Fn(FetchPolicy) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CacheResult<T>, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move |policy| Box::pin(fetcher(policy))),
      receiver: None,
      fetched_at: None,
      source: None,
      cached_at: None,
      background_error: None,
      refetch_interval: None,
      refetch_on_focus: true,
      refetch_on_reconnect: true,
      subscription: None,
    }
  }

  /// Refetch every `interval` while the query is alive.
  pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
    self.refetch_interval = Some(interval);
    self
  }

  pub fn refetch_on_focus(mut self, enabled: bool) -> Self {
    self.refetch_on_focus = enabled;
    self
  }

  pub fn refetch_on_reconnect(mut self, enabled: bool) -> Self {
    self.refetch_on_reconnect = enabled;
    self
  }

  /// Follow cache events for `tags`: refetch on invalidation.
  pub fn subscribe(mut self, events: broadcast::Receiver<CacheEvent>, tags: Vec<Tag>) -> Self {
    self.subscription = Some(Subscription {
      events,
      tags,
      peek: None,
    });
    self
  }

  /// Re-read the cache on local updates (optimistic patches and undos).
  ///
  /// Only has an effect together with `subscribe`.
  pub fn with_peek<F>(mut self, peek: F) -> Self
  where
    F: Fn() -> Option<T> + Send + Sync + 'static,
  {
    if let Some(sub) = &mut self.subscription {
      sub.peek = Some(Box::new(peek));
    }
    self
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query succeeded.
  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  /// Check if the first fetch is still running.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Check if any fetch is running, including background refetches.
  pub fn is_fetching(&self) -> bool {
    self.receiver.is_some()
  }

  /// Check if the query succeeded.
  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  /// Check if the query failed.
  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error message if the query failed.
  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Error from the last refetch when older data is still displayed.
  pub fn background_error(&self) -> Option<&str> {
    self.background_error.as_deref()
  }

  /// When the data shown is a cached copy served because the service was
  /// unreachable, the time it was cached.
  pub fn offline_since(&self) -> Option<DateTime<Utc>> {
    match self.source {
      Some(CacheSource::Offline) => self.cached_at,
      _ => None,
    }
  }

  /// Start fetching data if not already fetching.
  pub fn fetch(&mut self) {
    if self.is_fetching() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, even if already fetching or data exists.
  pub fn refetch(&mut self) {
    // Stop listening for the pending fetch by dropping the receiver
    self.receiver = None;
    self.start_fetch();
  }

  /// Terminal regained focus.
  pub fn on_focus(&mut self) {
    if self.refetch_on_focus && !matches!(self.state, QueryState::Idle) {
      self.fetch();
    }
  }

  /// Drive the query: collect results and fire refetch triggers.
  ///
  /// Returns `true` if the state changed. Call this on every tick.
  pub fn tick(&mut self) -> bool {
    let mut changed = self.poll();
    changed |= self.poll_events();

    if let (Some(interval), Some(fetched_at)) = (self.refetch_interval, self.fetched_at) {
      if !self.is_fetching() && fetched_at.elapsed() >= interval {
        tracing::trace!("interval refetch");
        self.start_fetch();
      }
    }

    changed
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    // Try to receive without blocking
    let result = match receiver.try_recv() {
      Ok(result) => result,
      Err(mpsc::error::TryRecvError::Empty) => return false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        Err("Query was cancelled".to_string())
      }
    };

    self.receiver = None;
    self.fetched_at = Some(Instant::now());
    match result {
      Ok(result) => {
        self.state = QueryState::Success(result.data);
        self.source = Some(result.source);
        self.cached_at = result.cached_at;
        self.background_error = None;
      }
      Err(error) => {
        if self.state.is_success() {
          tracing::debug!(%error, "background refetch failed, keeping previous data");
          self.background_error = Some(error);
        } else {
          self.state = QueryState::Error(error);
        }
      }
    }
    true
  }

  /// Drain pending cache events.
  fn poll_events(&mut self) -> bool {
    let Some(sub) = &mut self.subscription else {
      return false;
    };

    let mut refetch = false;
    let mut repeek = false;
    loop {
      match sub.events.try_recv() {
        Ok(event @ CacheEvent::Invalidated(_)) => refetch |= event.touches(&sub.tags),
        Ok(event @ CacheEvent::Updated(_)) => repeek |= event.touches(&sub.tags),
        Ok(CacheEvent::Reconnected) => refetch |= self.refetch_on_reconnect,
        Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
          tracing::debug!(skipped, "cache events lagged, refetching");
          refetch = true;
        }
        Err(broadcast::error::TryRecvError::Empty) => break,
        Err(broadcast::error::TryRecvError::Closed) => {
          self.subscription = None;
          break;
        }
      }
    }

    let mut changed = false;
    if repeek && !matches!(self.state, QueryState::Idle) {
      let peeked = self
        .subscription
        .as_ref()
        .and_then(|s| s.peek.as_ref())
        .and_then(|peek| peek());
      if let Some(data) = peeked {
        self.state = QueryState::Success(data);
        changed = true;
      }
    }
    if refetch && !matches!(self.state, QueryState::Idle) {
      self.refetch();
      changed = true;
    }
    changed
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    if !self.state.is_success() {
      self.state = QueryState::Loading;
    }

    let policy = if self.state.is_success() {
      FetchPolicy::NetworkOnly
    } else {
      FetchPolicy::CacheFirst
    };
    let future = (self.fetcher)(policy);
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

// Query is not Clone because the fetcher is boxed and receiver is owned.

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("fetched_at", &self.fetched_at)
      .field("refetch_interval", &self.refetch_interval)
      .finish_non_exhaustive()
  }
}

/// One-shot async write whose result is picked up on a later tick.
pub struct Mutation<T, E = String> {
  receiver: Option<oneshot::Receiver<Result<T, E>>>,
}

impl<T, E> Default for Mutation<T, E> {
  fn default() -> Self {
    Self { receiver: None }
  }
}

impl<T: Send + 'static, E: Send + 'static> Mutation<T, E> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_pending(&self) -> bool {
    self.receiver.is_some()
  }

  /// Spawn `future`. A mutation still pending is detached, not cancelled.
  pub fn run<Fut>(&mut self, future: Fut)
  where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
  }

  /// Take the result once it is ready.
  pub fn poll(&mut self) -> Option<Result<T, E>> {
    let receiver = self.receiver.as_mut()?;
    match receiver.try_recv() {
      Ok(result) => {
        self.receiver = None;
        Some(result)
      }
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => {
        // Task panicked before sending
        self.receiver = None;
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  fn counting_query(counter: Arc<AtomicU32>) -> Query<u32> {
    Query::new(move |_| {
      let counter = counter.clone();
      async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst)) }
    })
  }

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|_| async { Ok::<_, String>(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|_| async { Err("Something went wrong".to_string()) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let mut query = Query::new(|_| async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok::<_, String>(42)
    });

    query.fetch();
    assert!(query.is_loading());

    // Second fetch should be no-op
    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_refetch_drops_pending() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move |_| {
      let counter = counter_clone.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Refetch should ignore the first and start a new one
    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    // Only the second fetch should have been received
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_background_refetch_keeps_data() {
    let fail = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let fail_clone = fail.clone();
    let mut query = Query::new(move |_| {
      let fail = fail_clone.load(Ordering::SeqCst);
      async move {
        if fail {
          Err("offline".to_string())
        } else {
          Ok(7)
        }
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    fail.store(true, Ordering::SeqCst);
    query.refetch();
    assert!(query.is_fetching());
    assert!(!query.is_loading());
    assert_eq!(query.data(), Some(&7));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&7));
    assert_eq!(query.background_error(), Some("offline"));
  }

  #[tokio::test]
  async fn test_interval_refetch() {
    let counter = Arc::new(AtomicU32::new(0));
    let mut query =
      counting_query(counter.clone()).with_refetch_interval(Duration::from_millis(20));

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.tick();
    assert_eq!(query.data(), Some(&0));

    tokio::time::sleep(Duration::from_millis(30)).await;
    query.tick(); // interval elapsed, starts a refetch
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.tick();
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_invalidation_refetches_matching_tags_only() {
    let counter = Arc::new(AtomicU32::new(0));
    let (tx, rx) = broadcast::channel(8);
    let mut query = counting_query(counter.clone()).subscribe(rx, vec![Tag::list("book")]);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.tick();
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    tx.send(CacheEvent::Invalidated(vec![Tag::list("borrow_summary")]))
      .unwrap();
    assert!(!query.tick());
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    tx.send(CacheEvent::Invalidated(vec![Tag::id("book", "1")]))
      .unwrap();
    assert!(query.tick());
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.tick();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_updated_event_repeeks_cache() {
    let (tx, rx) = broadcast::channel(8);
    let mut query = Query::new(|_| async { Ok::<_, String>(1) })
      .subscribe(rx, vec![Tag::list("book")])
      .with_peek(|| Some(99));

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.tick();
    assert_eq!(query.data(), Some(&1));

    tx.send(CacheEvent::Updated(vec![Tag::list("book")])).unwrap();
    assert!(query.tick());
    assert_eq!(query.data(), Some(&99));
  }

  #[tokio::test]
  async fn test_reconnect_and_focus_triggers() {
    let counter = Arc::new(AtomicU32::new(0));
    let (tx, rx) = broadcast::channel(8);
    let mut query = counting_query(counter.clone())
      .subscribe(rx, vec![Tag::list("book")])
      .refetch_on_focus(false);

    // Nothing happens before the first fetch
    query.on_focus();
    tx.send(CacheEvent::Reconnected).unwrap();
    query.tick();
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.tick();

    query.on_focus();
    assert!(!query.is_fetching());

    tx.send(CacheEvent::Reconnected).unwrap();
    query.tick();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.tick();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_lagged_subscriber_refetches() {
    let counter = Arc::new(AtomicU32::new(0));
    let (tx, rx) = broadcast::channel(1);
    let mut query = counting_query(counter.clone()).subscribe(rx, vec![Tag::list("book")]);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.tick();

    for _ in 0..3 {
      tx.send(CacheEvent::Updated(vec![Tag::list("other")])).unwrap();
    }
    assert!(query.tick());
    assert!(query.is_fetching());
  }

  #[tokio::test]
  async fn test_refetch_bypasses_cache() {
    let policies = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = policies.clone();
    let mut query = Query::new(move |policy| {
      seen.lock().unwrap().push(policy);
      async { Ok::<_, String>(1) }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    query.refetch();

    assert_eq!(
      *policies.lock().unwrap(),
      vec![FetchPolicy::CacheFirst, FetchPolicy::NetworkOnly]
    );
  }

  #[tokio::test]
  async fn test_offline_source_is_reported() {
    let offline = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let cached_at = Utc::now();
    let flag = offline.clone();
    let mut query = Query::from_cache(move |_| {
      let offline = flag.load(Ordering::SeqCst);
      async move {
        Ok::<_, String>(if offline {
          CacheResult::offline(3, cached_at)
        } else {
          CacheResult::from_network(3)
        })
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.offline_since(), None);

    offline.store(true, Ordering::SeqCst);
    query.refetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.data(), Some(&3));
    assert_eq!(query.offline_since(), Some(cached_at));

    offline.store(false, Ordering::SeqCst);
    query.refetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.offline_since(), None);
  }

  #[tokio::test]
  async fn test_mutation_result() {
    let mut mutation: Mutation<u32, String> = Mutation::new();
    assert!(mutation.poll().is_none());

    mutation.run(async { Ok(5) });
    assert!(mutation.is_pending());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(mutation.poll(), Some(Ok(5)));
    assert!(!mutation.is_pending());
  }
}
