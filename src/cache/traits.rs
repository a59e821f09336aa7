//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

/// Trait for entities that can be cached.
///
/// Implementors must provide a unique cache key and the entity type name
/// used to partition storage.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this entity (e.g., product id, category id)
  fn cache_key(&self) -> String;

  /// Entity type name for storage organization (e.g., "product", "category")
  fn entity_type() -> &'static str;
}

/// A cacheable query: a stable lookup key plus a human readable description.
pub trait QueryKey {
  /// Canonical text form of the query. Two queries with equal canonical
  /// forms share a cache entry.
  fn canonical(&self) -> String;

  /// Description stored alongside the cached rows.
  fn description(&self) -> String;

  /// SHA256 of the canonical form, for stable fixed-length keys.
  fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.canonical().as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached
  pub cached_at: DateTime<Utc>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at,
    }
  }

  /// Create a new cache result from cached data that is still fresh.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at,
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still inside the freshness window
  CacheFresh,
  /// Network unavailable, serving stale cached data
  Offline,
}

impl CacheSource {
  pub fn label(&self) -> &'static str {
    match self {
      CacheSource::Network => "network",
      CacheSource::CacheFresh => "cache",
      CacheSource::Offline => "offline (stale cache)",
    }
  }
}
