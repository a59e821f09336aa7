//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::Cacheable;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of a cached query lookup.
#[derive(Debug, Clone)]
pub struct CachedQueryResult<T> {
  /// The cached entities in order
  pub entities: Vec<T>,
  /// When the query result was cached
  pub cached_at: DateTime<Utc>,
}

/// A single cached entity.
#[derive(Debug, Clone)]
pub struct CachedEntity<T> {
  /// The cached entity
  pub entity: T,
  /// When the entity was cached
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Replace the entities stored for a query.
  fn store_query_result<T: Cacheable>(
    &self,
    key: &str,
    description: &str,
    entities: &[T],
    cached_at: DateTime<Utc>,
  ) -> Result<()>;

  /// Get cached entities for a query.
  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>>;

  /// Get a single entity by key.
  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>>;

  /// Store a single entity.
  fn store_entity<T: Cacheable>(&self, entity: &T, cached_at: DateTime<Utc>) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn store_query_result<T: Cacheable>(
    &self,
    _key: &str,
    _description: &str,
    _entities: &[T],
    _cached_at: DateTime<Utc>,
  ) -> Result<()> {
    Ok(()) // Discard
  }

  fn get_query_result<T: Cacheable>(&self, _key: &str) -> Result<Option<CachedQueryResult<T>>> {
    Ok(None) // Always miss
  }

  fn get_entity<T: Cacheable>(&self, _entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    Ok(None) // Always miss
  }

  fn store_entity<T: Cacheable>(&self, _entity: &T, _cached_at: DateTime<Utc>) -> Result<()> {
    Ok(()) // Discard
  }
}

/// Storage chosen at runtime from configuration.
pub enum ConfiguredStorage {
  Sqlite(SqliteStorage),
  Disabled(NoopStorage),
}

impl CacheStorage for ConfiguredStorage {
  fn store_query_result<T: Cacheable>(
    &self,
    key: &str,
    description: &str,
    entities: &[T],
    cached_at: DateTime<Utc>,
  ) -> Result<()> {
    match self {
      Self::Sqlite(s) => s.store_query_result(key, description, entities, cached_at),
      Self::Disabled(s) => s.store_query_result(key, description, entities, cached_at),
    }
  }

  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>> {
    match self {
      Self::Sqlite(s) => s.get_query_result(key),
      Self::Disabled(s) => s.get_query_result(key),
    }
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    match self {
      Self::Sqlite(s) => s.get_entity(entity_key),
      Self::Disabled(s) => s.get_entity(entity_key),
    }
  }

  fn store_entity<T: Cacheable>(&self, entity: &T, cached_at: DateTime<Utc>) -> Result<()> {
    match self {
      Self::Sqlite(s) => s.store_entity(entity, cached_at),
      Self::Disabled(s) => s.store_entity(entity, cached_at),
    }
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the cache database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Cache that lives only as long as this value.
  #[allow(dead_code)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    Ok(crate::db::data_dir()?.join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Generic entity cache (stores serialized JSON)
CREATE TABLE IF NOT EXISTS entity_cache (
    entity_type TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (entity_type, entity_key)
);

-- Query result tracking
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    query_description TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    cached_at TEXT NOT NULL,
    result_count INTEGER NOT NULL
);

-- Query to entity mapping (preserves order)
CREATE TABLE IF NOT EXISTS query_results (
    query_hash TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (query_hash, position),
    FOREIGN KEY (query_hash) REFERENCES query_cache(query_hash) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_query_results_hash ON query_results(query_hash);
"#;

impl CacheStorage for SqliteStorage {
  fn store_query_result<T: Cacheable>(
    &self,
    key: &str,
    description: &str,
    entities: &[T],
    cached_at: DateTime<Utc>,
  ) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entity_type = T::entity_type();
    let cached_at = cached_at.format(DATETIME_FORMAT).to_string();

    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    // Entities that dropped out of the result must not linger as single-entity hits
    tx.execute(
      "DELETE FROM entity_cache WHERE entity_type = ? AND entity_key IN
         (SELECT entity_key FROM query_results WHERE query_hash = ?)",
      params![entity_type, key],
    )
    .map_err(|e| eyre!("Failed to delete old entities: {}", e))?;

    tx.execute(
      "DELETE FROM query_results WHERE query_hash = ?",
      params![key],
    )
    .map_err(|e| eyre!("Failed to delete old query results: {}", e))?;

    tx.execute(
      "INSERT OR REPLACE INTO query_cache (query_hash, query_description, entity_type, cached_at, result_count)
       VALUES (?, ?, ?, ?, ?)",
      params![key, description, entity_type, cached_at, entities.len()],
    )
    .map_err(|e| eyre!("Failed to update query cache: {}", e))?;

    for (position, entity) in entities.iter().enumerate() {
      let entity_key = entity.cache_key();
      let data =
        serde_json::to_vec(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

      tx.execute(
        "INSERT OR REPLACE INTO entity_cache (entity_type, entity_key, data, cached_at)
         VALUES (?, ?, ?, ?)",
        params![entity_type, entity_key, data, cached_at],
      )
      .map_err(|e| eyre!("Failed to store entity: {}", e))?;

      tx.execute(
        "INSERT OR REPLACE INTO query_results (query_hash, entity_key, position)
         VALUES (?, ?, ?)",
        params![key, entity_key, position],
      )
      .map_err(|e| eyre!("Failed to store query result: {}", e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let entity_type = T::entity_type();

    let cached_at_str: Option<String> = conn
      .query_row(
        "SELECT cached_at FROM query_cache WHERE query_hash = ? AND entity_type = ?",
        params![key, entity_type],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read query cache: {}", e))?;

    let Some(cached_at_str) = cached_at_str else {
      return Ok(None);
    };
    let cached_at = parse_datetime(&cached_at_str)?;

    // Get entities in order
    let mut stmt = conn
      .prepare(
        "SELECT ec.data FROM entity_cache ec
         INNER JOIN query_results qr ON ec.entity_type = ? AND ec.entity_key = qr.entity_key
         WHERE qr.query_hash = ?
         ORDER BY qr.position",
      )
      .map_err(|e| eyre!("Failed to prepare entity query: {}", e))?;

    let rows = stmt
      .query_map(params![entity_type, key], |row| row.get::<_, Vec<u8>>(0))
      .map_err(|e| eyre!("Failed to query entities: {}", e))?;

    let mut entities = Vec::new();
    for data in rows {
      let data = data.map_err(|e| eyre!("Failed to read cached entity: {}", e))?;
      let entity: T = serde_json::from_slice(&data)
        .map_err(|e| eyre!("Failed to deserialize cached entity: {}", e))?;
      entities.push(entity);
    }

    Ok(Some(CachedQueryResult {
      entities,
      cached_at,
    }))
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let result: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, cached_at FROM entity_cache
         WHERE entity_type = ? AND entity_key = ?",
        params![T::entity_type(), entity_key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cached entity: {}", e))?;

    match result {
      Some((data, cached_at_str)) => {
        let entity: T = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize entity: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntity { entity, cached_at }))
      }
      None => Ok(None),
    }
  }

  fn store_entity<T: Cacheable>(&self, entity: &T, cached_at: DateTime<Utc>) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data =
      serde_json::to_vec(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entity_cache (entity_type, entity_key, data, cached_at)
         VALUES (?, ?, ?, ?)",
        params![
          T::entity_type(),
          entity.cache_key(),
          data,
          cached_at.format(DATETIME_FORMAT).to_string()
        ],
      )
      .map_err(|e| eyre!("Failed to store entity: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string as stored in the cache tables.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
