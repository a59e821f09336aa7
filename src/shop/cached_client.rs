//! Storefront client with transparent caching for catalog reads.

use color_eyre::Result;

use crate::cache::{CacheLayer, CacheResult, CacheStorage};

use super::cache::ShopQueryKey;
use super::client::ShopClient;
use super::types::{Category, Product, SubCategory};

/// Catalog reads go through the cache and fall back to it when offline.
/// Writes and account calls are made on [`CachedShopClient::inner`] directly.
pub struct CachedShopClient<S: CacheStorage> {
  inner: ShopClient,
  cache: CacheLayer<S>,
}

impl<S: CacheStorage> CachedShopClient<S> {
  pub fn new(inner: ShopClient, cache: CacheLayer<S>) -> Self {
    Self { inner, cache }
  }

  pub fn inner(&self) -> &ShopClient {
    &self.inner
  }

  /// All top-level categories.
  pub async fn categories(&self, force: bool) -> Result<CacheResult<Vec<Category>>> {
    self
      .cache
      .fetch_list(&ShopQueryKey::Categories, force, || {
        let inner = self.inner.clone();
        async move { Ok(inner.list_categories().await?) }
      })
      .await
  }

  /// Sub-categories of one category.
  pub async fn subcategories(
    &self,
    category_id: &str,
    force: bool,
  ) -> Result<CacheResult<Vec<SubCategory>>> {
    let query_key = ShopQueryKey::SubCategories {
      category_id: category_id.to_string(),
    };

    self
      .cache
      .fetch_list(&query_key, force, || {
        let inner = self.inner.clone();
        let category_id = category_id.to_string();
        async move { Ok(inner.list_subcategories(&category_id).await?) }
      })
      .await
  }

  /// A single product. Products cached with the catalog list are served
  /// from there while fresh.
  pub async fn product(&self, id: &str) -> Result<CacheResult<Product>> {
    self
      .cache
      .fetch_one(id, || {
        let inner = self.inner.clone();
        let id = id.to_string();
        async move { Ok(inner.get_product(&id).await?) }
      })
      .await
  }
}

impl<S: CacheStorage> Clone for CachedShopClient<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
    }
  }
}
