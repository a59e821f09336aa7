//! Generic caching layer for data persistence and offline support.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Caches entities under a stable key per entity type
//! - Stores ordered list results per query, keyed by a hashed query description
//! - Treats entries older than the freshness window as stale
//! - Provides basic offline mode (serve stale cache when network unavailable)

mod layer;
mod storage;
mod traits;

pub use layer::{CacheLayer, DEFAULT_STALE_HOURS};
pub use storage::{CacheStorage, ConfiguredStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, Cacheable, QueryKey};
