//! Cache storage trait with in-memory, SQLite and no-op implementations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::error::{CacheError, Result};
use super::tags::{Tag, TagId};
use super::traits::{Cacheable, QueryKey};

/// Result of a cached query lookup.
#[derive(Debug, Clone)]
pub struct CachedQueryResult<T> {
  /// The cached entities in order
  pub entities: Vec<T>,
  /// When the query result was cached
  pub cached_at: DateTime<Utc>,
  /// Whether the entry was invalidated since it was stored
  pub stale: bool,
}

/// A single cached entity.
#[derive(Debug, Clone)]
pub struct CachedEntity<T> {
  /// The cached entity
  pub entity: T,
  /// When the entity was cached
  pub cached_at: DateTime<Utc>,
  /// Whether the entry was invalidated since it was stored
  pub stale: bool,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Store entities from a query result, replacing any previous result.
  fn store_query_result<T: Cacheable>(&self, tag: &Tag, entities: &[T]) -> Result<()>;

  /// Get cached entities for a query.
  fn get_query_result<T: Cacheable>(&self, tag: &Tag) -> Result<Option<CachedQueryResult<T>>>;

  /// Get a single entity by key.
  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>>;

  /// Store a single entity.
  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()>;

  /// Drop a single entity (e.g. after it was deleted upstream).
  fn remove_entity(&self, entity_type: &str, entity_key: &str) -> Result<()>;

  /// Mark the entry addressed by `tag` as stale.
  fn invalidate(&self, tag: &Tag) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn store_query_result<T: Cacheable>(&self, _tag: &Tag, _entities: &[T]) -> Result<()> {
    Ok(()) // Discard
  }

  fn get_query_result<T: Cacheable>(&self, _tag: &Tag) -> Result<Option<CachedQueryResult<T>>> {
    Ok(None) // Always miss
  }

  fn get_entity<T: Cacheable>(&self, _entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    Ok(None) // Always miss
  }

  fn store_entity<T: Cacheable>(&self, _entity: &T) -> Result<()> {
    Ok(())
  }

  fn remove_entity(&self, _entity_type: &str, _entity_key: &str) -> Result<()> {
    Ok(())
  }

  fn invalidate(&self, _tag: &Tag) -> Result<()> {
    Ok(())
  }
}

// ============================================================================
// In-memory storage
// ============================================================================

struct EntityRow {
  data: Vec<u8>,
  cached_at: DateTime<Utc>,
  stale: bool,
}

struct QueryRow {
  entity_type: &'static str,
  entity_keys: Vec<String>,
  cached_at: DateTime<Utc>,
  stale: bool,
}

#[derive(Default)]
struct MemoryState {
  entities: HashMap<(String, String), EntityRow>,
  queries: HashMap<String, QueryRow>,
}

/// Process-local storage. Mirrors the SQLite layout: query results are
/// ordered key lists resolved through the entity table.
#[derive(Default)]
pub struct MemoryStorage {
  state: Mutex<MemoryState>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
    self.state.lock().map_err(|_| CacheError::LockPoisoned)
  }
}

impl CacheStorage for MemoryStorage {
  fn store_query_result<T: Cacheable>(&self, tag: &Tag, entities: &[T]) -> Result<()> {
    let mut state = self.lock()?;
    let entity_type = T::entity_type();
    let now = Utc::now();

    let mut entity_keys = Vec::with_capacity(entities.len());
    for entity in entities {
      let key = entity.cache_key();
      state.entities.insert(
        (entity_type.to_string(), key.clone()),
        EntityRow {
          data: serde_json::to_vec(entity)?,
          cached_at: now,
          stale: false,
        },
      );
      entity_keys.push(key);
    }

    state.queries.insert(
      tag.cache_hash(),
      QueryRow {
        entity_type,
        entity_keys,
        cached_at: now,
        stale: false,
      },
    );
    Ok(())
  }

  fn get_query_result<T: Cacheable>(&self, tag: &Tag) -> Result<Option<CachedQueryResult<T>>> {
    let state = self.lock()?;
    let entity_type = T::entity_type();

    let query = match state.queries.get(&tag.cache_hash()) {
      Some(q) if q.entity_type == entity_type => q,
      _ => return Ok(None),
    };

    let entities = query
      .entity_keys
      .iter()
      .filter_map(|key| state.entities.get(&(entity_type.to_string(), key.clone())))
      .filter_map(|row| serde_json::from_slice(&row.data).ok())
      .collect();

    Ok(Some(CachedQueryResult {
      entities,
      cached_at: query.cached_at,
      stale: query.stale,
    }))
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    let state = self.lock()?;
    let key = (T::entity_type().to_string(), entity_key.to_string());

    match state.entities.get(&key) {
      Some(row) => Ok(Some(CachedEntity {
        entity: serde_json::from_slice(&row.data)?,
        cached_at: row.cached_at,
        stale: row.stale,
      })),
      None => Ok(None),
    }
  }

  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()> {
    let mut state = self.lock()?;
    state.entities.insert(
      (T::entity_type().to_string(), entity.cache_key()),
      EntityRow {
        data: serde_json::to_vec(entity)?,
        cached_at: Utc::now(),
        stale: false,
      },
    );
    Ok(())
  }

  fn remove_entity(&self, entity_type: &str, entity_key: &str) -> Result<()> {
    let mut state = self.lock()?;
    state
      .entities
      .remove(&(entity_type.to_string(), entity_key.to_string()));
    Ok(())
  }

  fn invalidate(&self, tag: &Tag) -> Result<()> {
    let mut state = self.lock()?;
    match &tag.id {
      TagId::List => {
        if let Some(query) = state.queries.get_mut(&tag.cache_hash()) {
          query.stale = true;
        }
      }
      TagId::Id(id) => {
        if let Some(row) = state
          .entities
          .get_mut(&(tag.entity_type.to_string(), id.clone()))
        {
          row.stale = true;
        }
      }
    }
    Ok(())
  }
}

// ============================================================================
// SQLite storage
// ============================================================================

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  /// Open or create the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    tracing::debug!(path = %path.display(), "opened cache database");
    Self::with_connection(conn)
  }

  /// Open a throwaway in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(CacheError::NoDataDir)?;

    Ok(data_dir.join("shelf").join("cache.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| CacheError::LockPoisoned)
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Generic entity cache (stores serialized JSON)
CREATE TABLE IF NOT EXISTS entity_cache (
    entity_type TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    data BLOB NOT NULL,
    stale INTEGER NOT NULL DEFAULT 0,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (entity_type, entity_key)
);

-- Query result tracking
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    query_description TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    stale INTEGER NOT NULL DEFAULT 0,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    result_count INTEGER NOT NULL
);

-- Query to entity mapping (preserves order)
CREATE TABLE IF NOT EXISTS query_results (
    query_hash TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (query_hash, entity_key)
);

CREATE INDEX IF NOT EXISTS idx_query_results_hash ON query_results(query_hash);
"#;

impl CacheStorage for SqliteStorage {
  fn store_query_result<T: Cacheable>(&self, tag: &Tag, entities: &[T]) -> Result<()> {
    let conn = self.lock()?;
    let entity_type = T::entity_type();
    let query_hash = tag.cache_hash();

    let tx = conn.unchecked_transaction()?;

    // Delete existing query results
    tx.execute(
      "DELETE FROM query_results WHERE query_hash = ?",
      params![query_hash],
    )?;

    tx.execute(
      "INSERT OR REPLACE INTO query_cache (query_hash, query_description, entity_type, stale, cached_at, result_count)
       VALUES (?, ?, ?, 0, datetime('now'), ?)",
      params![query_hash, tag.description(), entity_type, entities.len()],
    )?;

    for (position, entity) in entities.iter().enumerate() {
      let entity_key = entity.cache_key();
      let data = serde_json::to_vec(entity)?;

      tx.execute(
        "INSERT OR REPLACE INTO entity_cache (entity_type, entity_key, data, stale, cached_at)
         VALUES (?, ?, ?, 0, datetime('now'))",
        params![entity_type, entity_key, data],
      )?;

      tx.execute(
        "INSERT OR REPLACE INTO query_results (query_hash, entity_key, position)
         VALUES (?, ?, ?)",
        params![query_hash, entity_key, position],
      )?;
    }

    tx.commit()?;
    Ok(())
  }

  fn get_query_result<T: Cacheable>(&self, tag: &Tag) -> Result<Option<CachedQueryResult<T>>> {
    let conn = self.lock()?;
    let entity_type = T::entity_type();
    let query_hash = tag.cache_hash();

    let query_info: Option<(String, bool)> = conn
      .query_row(
        "SELECT cached_at, stale FROM query_cache
         WHERE query_hash = ? AND entity_type = ?",
        params![query_hash, entity_type],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    let (cached_at_str, stale) = match query_info {
      Some(info) => info,
      None => return Ok(None),
    };
    let cached_at = parse_datetime(&cached_at_str)?;

    // Get entities in order
    let mut stmt = conn.prepare(
      "SELECT ec.data FROM entity_cache ec
       INNER JOIN query_results qr ON ec.entity_type = ? AND ec.entity_key = qr.entity_key
       WHERE qr.query_hash = ?
       ORDER BY qr.position",
    )?;

    let entities: Vec<T> = stmt
      .query_map(params![entity_type, query_hash], |row| {
        row.get::<_, Vec<u8>>(0)
      })?
      .filter_map(|r| r.ok())
      .filter_map(|data| serde_json::from_slice(&data).ok())
      .collect();

    Ok(Some(CachedQueryResult {
      entities,
      cached_at,
      stale,
    }))
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, String, bool)> = conn
      .query_row(
        "SELECT data, cached_at, stale FROM entity_cache
         WHERE entity_type = ? AND entity_key = ?",
        params![T::entity_type(), entity_key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()?;

    match row {
      Some((data, cached_at_str, stale)) => Ok(Some(CachedEntity {
        entity: serde_json::from_slice(&data)?,
        cached_at: parse_datetime(&cached_at_str)?,
        stale,
      })),
      None => Ok(None),
    }
  }

  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()> {
    let conn = self.lock()?;
    let data = serde_json::to_vec(entity)?;

    conn.execute(
      "INSERT OR REPLACE INTO entity_cache (entity_type, entity_key, data, stale, cached_at)
       VALUES (?, ?, ?, 0, datetime('now'))",
      params![T::entity_type(), entity.cache_key(), data],
    )?;
    Ok(())
  }

  fn remove_entity(&self, entity_type: &str, entity_key: &str) -> Result<()> {
    let conn = self.lock()?;
    conn.execute(
      "DELETE FROM entity_cache WHERE entity_type = ? AND entity_key = ?",
      params![entity_type, entity_key],
    )?;
    Ok(())
  }

  fn invalidate(&self, tag: &Tag) -> Result<()> {
    let conn = self.lock()?;
    match &tag.id {
      TagId::List => conn.execute(
        "UPDATE query_cache SET stale = 1 WHERE query_hash = ?",
        params![tag.cache_hash()],
      )?,
      TagId::Id(id) => conn.execute(
        "UPDATE entity_cache SET stale = 1 WHERE entity_type = ? AND entity_key = ?",
        params![tag.entity_type, id],
      )?,
    };
    Ok(())
  }
}

// ============================================================================
// Runtime-selected backend
// ============================================================================

/// Storage backend chosen from configuration at startup.
pub enum AnyStorage {
  Memory(MemoryStorage),
  Sqlite(SqliteStorage),
  Noop(NoopStorage),
}

macro_rules! delegate {
  ($self:ident, $s:ident => $call:expr) => {
    match $self {
      AnyStorage::Memory($s) => $call,
      AnyStorage::Sqlite($s) => $call,
      AnyStorage::Noop($s) => $call,
    }
  };
}

impl CacheStorage for AnyStorage {
  fn store_query_result<T: Cacheable>(&self, tag: &Tag, entities: &[T]) -> Result<()> {
    delegate!(self, s => s.store_query_result(tag, entities))
  }

  fn get_query_result<T: Cacheable>(&self, tag: &Tag) -> Result<Option<CachedQueryResult<T>>> {
    delegate!(self, s => s.get_query_result(tag))
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    delegate!(self, s => s.get_entity(entity_key))
  }

  fn store_entity<T: Cacheable>(&self, entity: &T) -> Result<()> {
    delegate!(self, s => s.store_entity(entity))
  }

  fn remove_entity(&self, entity_type: &str, entity_key: &str) -> Result<()> {
    delegate!(self, s => s.remove_entity(entity_type, entity_key))
  }

  fn invalidate(&self, tag: &Tag) -> Result<()> {
    delegate!(self, s => s.invalidate(tag))
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|_| CacheError::Timestamp(s.to_string()))
}
