//! Product catalog provider.
//!
//! Owns the cached product list for the lifetime of the application: it is
//! constructed once, started to load the catalog and keep it refreshed on a
//! timer, and shut down (or dropped) to stop the timer. Consumers read the
//! latest state or subscribe to changes.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::search::search_products;
use crate::cache::{CacheLayer, CacheSource, CacheStorage};
use crate::shop::{ShopClient, ShopQueryKey, Product};

/// Where the full product list comes from.
pub trait ProductSource: Send + Sync + 'static {
  fn fetch_products(&self) -> impl Future<Output = Result<Vec<Product>>> + Send;
}

impl ProductSource for ShopClient {
  async fn fetch_products(&self) -> Result<Vec<Product>> {
    Ok(self.list_products().await?)
  }
}

/// What consumers of the catalog see.
#[derive(Debug, Clone)]
pub enum CatalogState {
  /// Nothing loaded yet
  Loading,
  /// A product list is available
  Ready {
    products: Arc<Vec<Product>>,
    source: CacheSource,
    cached_at: DateTime<Utc>,
  },
  /// Loading failed and nothing was cached
  Failed(String),
}

impl CatalogState {
  pub fn products(&self) -> &[Product] {
    match self {
      CatalogState::Ready { products, .. } => products,
      _ => &[],
    }
  }
}

pub struct ProductProvider<P: ProductSource, S: CacheStorage> {
  source: P,
  cache: CacheLayer<S>,
  state: watch::Sender<CatalogState>,
  refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl<P: ProductSource, S: CacheStorage + 'static> ProductProvider<P, S> {
  pub fn new(source: P, cache: CacheLayer<S>) -> Self {
    let (state, _) = watch::channel(CatalogState::Loading);
    Self {
      source,
      cache,
      state,
      refresh_task: Mutex::new(None),
    }
  }

  /// Load the catalog once, then force a refresh every `interval` until
  /// shutdown. Calling `start` again replaces the running timer.
  pub fn start(self: &Arc<Self>, interval: Duration) {
    let provider = Arc::clone(self);
    let task = tokio::spawn(async move {
      provider.fetch_all_products(false).await;

      let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        tracing::info!("periodic catalog refresh");
        provider.fetch_all_products(true).await;
      }
    });

    if let Some(previous) = self.replace_task(Some(task)) {
      previous.abort();
    }
  }

  /// Stop the periodic refresh.
  pub fn shutdown(&self) {
    if let Some(task) = self.replace_task(None) {
      task.abort();
      tracing::debug!("catalog refresh stopped");
    }
  }

  fn replace_task(&self, task: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
    match self.refresh_task.lock() {
      Ok(mut slot) => std::mem::replace(&mut *slot, task),
      Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), task),
    }
  }

  /// Current product list, from cache when fresh and `force` is not set.
  ///
  /// Failures never propagate: a failed fetch falls back to whatever is
  /// cached, and with nothing cached the state becomes `Failed` and the
  /// returned list is empty.
  pub async fn fetch_all_products(&self, force: bool) -> Arc<Vec<Product>> {
    let result = self
      .cache
      .fetch_list(&ShopQueryKey::AllProducts, force, || self.source.fetch_products())
      .await;

    match result {
      Ok(result) => {
        if result.source == CacheSource::Network {
          tracing::info!(count = result.data.len(), "product catalog fetched");
        }
        let products = Arc::new(result.data);
        self.state.send_replace(CatalogState::Ready {
          products: Arc::clone(&products),
          source: result.source,
          cached_at: result.cached_at,
        });
        products
      }
      Err(err) => {
        tracing::error!(error = %err, "failed to load product catalog");
        self.state.send_replace(CatalogState::Failed(err.to_string()));
        Arc::new(Vec::new())
      }
    }
  }

  /// Forced fetch, for callers that just changed the catalog.
  pub async fn refresh_products(&self) -> Arc<Vec<Product>> {
    self.fetch_all_products(true).await
  }

  pub fn state(&self) -> CatalogState {
    self.state.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
    self.state.subscribe()
  }

  /// Search the currently loaded products.
  pub fn search(&self, query: &str) -> Vec<Product> {
    let state = self.state.borrow();
    search_products(state.products(), query)
      .into_iter()
      .cloned()
      .collect()
  }

  /// Look a product up in the currently loaded list.
  pub fn product(&self, id: &str) -> Option<Product> {
    self
      .state
      .borrow()
      .products()
      .iter()
      .find(|p| p.id == id)
      .cloned()
  }
}

impl<P: ProductSource, S: CacheStorage> Drop for ProductProvider<P, S> {
  fn drop(&mut self) {
    if let Ok(slot) = self.refresh_task.get_mut() {
      if let Some(task) = slot.take() {
        task.abort();
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{QueryKey, SqliteStorage};
  use chrono::Duration as ChronoDuration;
  use color_eyre::eyre::eyre;
  use serde_json::json;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

  /// Source that counts calls and can be switched to fail.
  #[derive(Clone, Default)]
  struct FakeSource {
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    products: Arc<Mutex<Vec<Product>>>,
  }

  impl FakeSource {
    fn with(products: Vec<Product>) -> Self {
      let source = Self::default();
      *source.products.lock().unwrap() = products;
      source
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self) {
      self.failing.store(true, Ordering::SeqCst);
    }
  }

  impl ProductSource for FakeSource {
    async fn fetch_products(&self) -> Result<Vec<Product>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.failing.load(Ordering::SeqCst) {
        return Err(eyre!("connection refused"));
      }
      Ok(self.products.lock().unwrap().clone())
    }
  }

  fn product(id: &str, name: &str, tags: &[&str]) -> Product {
    serde_json::from_value(json!({ "id": id, "name": name, "tags": tags })).unwrap()
  }

  fn provider(source: FakeSource) -> ProductProvider<FakeSource, SqliteStorage> {
    ProductProvider::new(
      source,
      CacheLayer::new(SqliteStorage::open_in_memory().unwrap()),
    )
  }

  fn seed_cache(
    provider: &ProductProvider<FakeSource, SqliteStorage>,
    products: &[Product],
    age: ChronoDuration,
  ) {
    let key = ShopQueryKey::AllProducts;
    provider
      .cache
      .storage()
      .store_query_result(
        &key.cache_hash(),
        &key.description(),
        products,
        Utc::now() - age,
      )
      .unwrap();
  }

  #[tokio::test]
  async fn test_empty_cache_fetches_and_stores() {
    let source = FakeSource::with(vec![product("1", "Tee", &[])]);
    let provider = provider(source.clone());
    assert!(matches!(provider.state(), CatalogState::Loading));

    let before = Utc::now() - ChronoDuration::seconds(1);
    let products = provider.fetch_all_products(false).await;
    assert_eq!(products.len(), 1);
    assert_eq!(source.calls(), 1);

    match provider.state() {
      CatalogState::Ready {
        products,
        source,
        cached_at,
      } => {
        assert_eq!(products[0].id, "1");
        assert_eq!(source, CacheSource::Network);
        assert!(cached_at >= before && cached_at <= Utc::now());
      }
      other => panic!("unexpected state {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_second_fetch_within_window_uses_cache() {
    let source = FakeSource::with(vec![product("1", "Tee", &[])]);
    let provider = provider(source.clone());

    provider.fetch_all_products(false).await;
    let products = provider.fetch_all_products(false).await;

    assert_eq!(products.len(), 1);
    assert_eq!(source.calls(), 1);
    assert!(matches!(
      provider.state(),
      CatalogState::Ready {
        source: CacheSource::CacheFresh,
        ..
      }
    ));
  }

  #[tokio::test]
  async fn test_forced_fetch_always_hits_network() {
    let source = FakeSource::with(vec![product("1", "Tee", &[])]);
    let provider = provider(source.clone());

    provider.fetch_all_products(false).await;
    provider.fetch_all_products(true).await;
    provider.refresh_products().await;

    assert_eq!(source.calls(), 3);
  }

  #[tokio::test]
  async fn test_stale_cache_is_replaced() {
    let source = FakeSource::with(vec![product("2", "New", &[]), product("3", "Newer", &[])]);
    let provider = provider(source.clone());
    seed_cache(&provider, &[product("1", "Old", &[])], ChronoDuration::hours(7));

    let products = provider.fetch_all_products(false).await;

    assert_eq!(source.calls(), 1);
    assert_eq!(products.len(), 2);
    // The cache now holds the new list
    let again = provider.fetch_all_products(false).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(again[0].id, "2");
  }

  #[tokio::test]
  async fn test_network_failure_serves_stale_cache() {
    let source = FakeSource::default();
    source.fail();
    let provider = provider(source.clone());
    let stale = vec![
      product("1", "A", &[]),
      product("2", "B", &[]),
      product("3", "C", &[]),
    ];
    seed_cache(&provider, &stale, ChronoDuration::hours(30));

    let products = provider.fetch_all_products(false).await;

    assert_eq!(source.calls(), 1);
    assert_eq!(products.len(), 3);
    assert!(matches!(
      provider.state(),
      CatalogState::Ready {
        source: CacheSource::Offline,
        ..
      }
    ));
  }

  #[tokio::test]
  async fn test_network_failure_without_cache_is_failed_state() {
    let source = FakeSource::default();
    source.fail();
    let provider = provider(source);

    let products = provider.fetch_all_products(false).await;

    assert!(products.is_empty());
    match provider.state() {
      CatalogState::Failed(message) => assert!(message.contains("connection refused")),
      other => panic!("unexpected state {:?}", other),
    }
  }

  /// Product row as an older build might have cached it, without `name`.
  #[derive(Clone, serde::Serialize, serde::Deserialize)]
  struct LegacyProduct {
    id: String,
  }

  impl crate::cache::Cacheable for LegacyProduct {
    fn cache_key(&self) -> String {
      self.id.clone()
    }

    fn entity_type() -> &'static str {
      "product"
    }
  }

  fn seed_legacy_cache(provider: &ProductProvider<FakeSource, SqliteStorage>) {
    let key = ShopQueryKey::AllProducts;
    provider
      .cache
      .storage()
      .store_query_result(
        &key.cache_hash(),
        &key.description(),
        &[LegacyProduct { id: "1".to_string() }],
        Utc::now(),
      )
      .unwrap();
  }

  #[tokio::test]
  async fn test_unreadable_cache_still_reaches_network() {
    let source = FakeSource::with(vec![product("2", "Tee", &[])]);
    let provider = provider(source.clone());
    seed_legacy_cache(&provider);

    let products = provider.fetch_all_products(true).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(products.len(), 1);
    assert!(matches!(
      provider.state(),
      CatalogState::Ready {
        source: CacheSource::Network,
        ..
      }
    ));

    // The fetched list replaced the unreadable entry
    let again = provider.fetch_all_products(false).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(again[0].id, "2");
  }

  #[tokio::test]
  async fn test_unreadable_cache_counts_as_empty() {
    let source = FakeSource::with(vec![product("2", "Tee", &[])]);
    let provider = provider(source.clone());
    seed_legacy_cache(&provider);

    let products = provider.fetch_all_products(false).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(products[0].name, "Tee");
  }

  #[tokio::test]
  async fn test_search_over_loaded_products() {
    let source = FakeSource::with(vec![
      product("1", "Leather Coat", &["jacket", "winter"]),
      product("2", "Sandals", &["summer"]),
    ]);
    let provider = provider(source);
    provider.fetch_all_products(false).await;

    let found = provider.search("jacket");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Leather Coat");
    assert!(provider.search("").is_empty());
    assert_eq!(provider.product("2").unwrap().name, "Sandals");
    assert!(provider.product("9").is_none());
  }

  #[tokio::test]
  async fn test_subscribers_see_updates() {
    let source = FakeSource::with(vec![product("1", "Tee", &[])]);
    let provider = provider(source);
    let mut rx = provider.subscribe();

    provider.fetch_all_products(false).await;

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().products().len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_periodic_refresh_until_shutdown() {
    let source = FakeSource::with(vec![product("1", "Tee", &[])]);
    let provider = Arc::new(provider(source.clone()));
    let period = Duration::from_secs(6 * 3600);

    provider.start(period);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls(), 1);

    tokio::time::sleep(period).await;
    assert_eq!(source.calls(), 2);

    tokio::time::sleep(period).await;
    assert_eq!(source.calls(), 3);

    provider.shutdown();
    tokio::time::sleep(period * 3).await;
    assert_eq!(source.calls(), 3);
  }
}
