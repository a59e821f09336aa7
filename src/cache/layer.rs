//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;

use super::storage::CacheStorage;
use super::traits::{CacheResult, Cacheable, QueryKey};

/// Default freshness window for cached data, in hours.
pub const DEFAULT_STALE_HOURS: i64 = 6;

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the application and the network client,
/// providing transparent caching with offline support.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: Duration::hours(DEFAULT_STALE_HOURS),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Cached data is stale once older than the stale time. A timestamp in
  /// the future is never trusted.
  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    let age = Utc::now() - cached_at;
    age > self.stale_time || age < Duration::zero()
  }

  /// Fetch a list with cache-first strategy.
  ///
  /// 1. Unless `force` is set, return the cached list if it is fresh
  /// 2. Otherwise fetch from network and replace the cached list
  /// 3. On network failure, return the cached list even if stale (offline mode)
  /// 4. With nothing cached, the network error is returned
  pub async fn fetch_list<T, K, F, Fut>(
    &self,
    key: &K,
    force: bool,
    fetcher: F,
  ) -> Result<CacheResult<Vec<T>>>
  where
    T: Cacheable,
    K: QueryKey,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let hash = key.cache_hash();
    // An unreadable entry (e.g. written by an older build) is a miss
    let cached = match self.storage.get_query_result::<T>(&hash) {
      Ok(cached) => cached,
      Err(err) => {
        tracing::warn!(query = %key.description(), error = %err, "unreadable cache entry, ignoring");
        None
      }
    };

    if let Some(cached) = &cached {
      if !force && !self.is_stale(cached.cached_at) {
        tracing::debug!(query = %key.description(), "cache hit");
        return Ok(CacheResult::from_cache(
          cached.entities.clone(),
          cached.cached_at,
        ));
      }
    }

    match fetcher().await {
      Ok(data) => {
        let now = Utc::now();
        match self
          .storage
          .store_query_result(&hash, &key.description(), &data, now)
        {
          Ok(()) => {
            tracing::debug!(query = %key.description(), count = data.len(), "cache refreshed")
          }
          Err(err) => {
            tracing::warn!(query = %key.description(), error = %err, "failed to store fetched data")
          }
        }
        Ok(CacheResult::from_network(data, now))
      }
      Err(err) => match cached {
        Some(cached) => {
          tracing::warn!(
            query = %key.description(),
            error = %err,
            cached_at = %cached.cached_at,
            "network fetch failed, serving cached data"
          );
          Ok(CacheResult::offline(cached.entities, cached.cached_at))
        }
        None => Err(err),
      },
    }
  }

  /// Fetch a single entity with caching.
  pub async fn fetch_one<T, F, Fut>(&self, entity_key: &str, fetcher: F) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let cached = match self.storage.get_entity::<T>(entity_key) {
      Ok(cached) => cached,
      Err(err) => {
        tracing::warn!(entity = %entity_key, error = %err, "unreadable cached entity, ignoring");
        None
      }
    };

    if let Some(cached) = &cached {
      if !self.is_stale(cached.cached_at) {
        return Ok(CacheResult::from_cache(cached.entity.clone(), cached.cached_at));
      }
    }

    match fetcher().await {
      Ok(data) => {
        let now = Utc::now();
        if let Err(err) = self.storage.store_entity(&data, now) {
          tracing::warn!(entity = %entity_key, error = %err, "failed to store fetched entity");
        }
        Ok(CacheResult::from_network(data, now))
      }
      Err(err) => match cached {
        Some(cached) => {
          tracing::warn!(
            entity = %entity_key,
            error = %err,
            "network fetch failed, serving cached entity"
          );
          Ok(CacheResult::offline(cached.entity, cached.cached_at))
        }
        None => Err(err),
      },
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::SqliteStorage;
  use crate::cache::CacheSource;
  use color_eyre::eyre::eyre;
  use serde::{Deserialize, Serialize};
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Item {
    id: u32,
  }

  impl Cacheable for Item {
    fn cache_key(&self) -> String {
      self.id.to_string()
    }

    fn entity_type() -> &'static str {
      "item"
    }
  }

  struct ItemsKey;

  impl QueryKey for ItemsKey {
    fn canonical(&self) -> String {
      "items".to_string()
    }

    fn description(&self) -> String {
      "all items".to_string()
    }
  }

  /// Storage whose every operation fails.
  struct BrokenStorage;

  impl CacheStorage for BrokenStorage {
    fn store_query_result<T: Cacheable>(
      &self,
      _key: &str,
      _description: &str,
      _entities: &[T],
      _cached_at: DateTime<Utc>,
    ) -> Result<()> {
      Err(eyre!("disk full"))
    }

    fn get_query_result<T: Cacheable>(
      &self,
      _key: &str,
    ) -> Result<Option<crate::cache::storage::CachedQueryResult<T>>> {
      Err(eyre!("malformed database"))
    }

    fn get_entity<T: Cacheable>(
      &self,
      _entity_key: &str,
    ) -> Result<Option<crate::cache::storage::CachedEntity<T>>> {
      Err(eyre!("malformed database"))
    }

    fn store_entity<T: Cacheable>(&self, _entity: &T, _cached_at: DateTime<Utc>) -> Result<()> {
      Err(eyre!("disk full"))
    }
  }

  fn layer() -> CacheLayer<SqliteStorage> {
    CacheLayer::new(SqliteStorage::open_in_memory().unwrap())
  }

  #[tokio::test]
  async fn test_fresh_cache_skips_network() {
    let cache = layer();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      let result = cache
        .fetch_list(&ItemsKey, false, || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(vec![Item { id: 1 }])
        })
        .await
        .unwrap();
      assert_eq!(result.data, vec![Item { id: 1 }]);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_force_always_fetches() {
    let cache = layer();
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
      let result = cache
        .fetch_list(&ItemsKey, true, || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(vec![Item { id: 1 }])
        })
        .await
        .unwrap();
      assert_eq!(result.source, CacheSource::Network);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_network_error_without_cache_is_returned() {
    let cache = layer();
    let result = cache
      .fetch_list::<Item, _, _, _>(&ItemsKey, false, || async { Err(eyre!("down")) })
      .await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_future_timestamp_is_stale() {
    let cache = layer();
    cache
      .storage()
      .store_query_result(
        &ItemsKey.cache_hash(),
        "all items",
        &[Item { id: 1 }],
        Utc::now() + Duration::hours(1),
      )
      .unwrap();

    let result = cache
      .fetch_list(&ItemsKey, false, || async { Ok(vec![Item { id: 2 }]) })
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, vec![Item { id: 2 }]);
  }

  #[tokio::test]
  async fn test_fetch_one_serves_stale_entity_offline() {
    let cache = layer().with_stale_time(Duration::minutes(5));
    cache
      .storage()
      .store_entity(&Item { id: 4 }, Utc::now() - Duration::hours(1))
      .unwrap();

    let result = cache
      .fetch_one::<Item, _, _>("4", || async { Err(eyre!("down")) })
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data, Item { id: 4 });
  }

  #[tokio::test]
  async fn test_storage_failures_do_not_hide_network_data() {
    let cache = CacheLayer::new(BrokenStorage);

    let result = cache
      .fetch_list(&ItemsKey, false, || async { Ok(vec![Item { id: 7 }]) })
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, vec![Item { id: 7 }]);

    let result = cache
      .fetch_one::<Item, _, _>("8", || async { Ok(Item { id: 8 }) })
      .await
      .unwrap();
    assert_eq!(result.data, Item { id: 8 });
  }
}
