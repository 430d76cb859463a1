//! Generic caching layer for server state.
//!
//! This module knows nothing about books. It provides:
//! - Tagged entries for single entities and whole collections
//! - Cache-first or network-only reads, with optional offline fallback
//! - Invalidation that marks entries stale and broadcasts to subscribers
//! - Optimistic list patches with snapshot/undo

mod error;
mod layer;
mod optimistic;
mod storage;
mod tags;
mod traits;

pub use error::CacheError;
pub use layer::CacheLayer;
pub use optimistic::PatchResult;
pub use storage::{AnyStorage, CacheStorage, MemoryStorage, NoopStorage, SqliteStorage};
pub use tags::{Tag, TagId};
pub use traits::{CacheEvent, CacheResult, CacheSource, Cacheable, FetchPolicy, QueryKey};
