//! Caching implementations for storefront types.

use crate::cache::{Cacheable, QueryKey};

use super::types::{Category, Product, SubCategory};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Product {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "product"
  }
}

impl Cacheable for Category {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "category"
  }
}

impl Cacheable for SubCategory {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "sub_category"
  }
}

// ============================================================================
// Query key types
// ============================================================================

/// Query key types for storefront API calls.
#[derive(Clone, Debug)]
pub enum ShopQueryKey {
  /// The full product list
  AllProducts,
  /// All top-level categories
  Categories,
  /// Sub-categories of one category
  SubCategories { category_id: String },
}

impl QueryKey for ShopQueryKey {
  fn canonical(&self) -> String {
    match self {
      Self::AllProducts => "products:all".to_string(),
      Self::Categories => "categories:all".to_string(),
      Self::SubCategories { category_id } => {
        format!("subcategories:{}", category_id.trim())
      }
    }
  }

  fn description(&self) -> String {
    match self {
      Self::AllProducts => "all products".to_string(),
      Self::Categories => "all categories".to_string(),
      Self::SubCategories { category_id } => format!("sub-categories of {}", category_id),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_subcategory_keys_are_per_category() {
    let a = ShopQueryKey::SubCategories {
      category_id: "c1".to_string(),
    };
    let b = ShopQueryKey::SubCategories {
      category_id: " c1 ".to_string(),
    };
    let c = ShopQueryKey::SubCategories {
      category_id: "c2".to_string(),
    };
    assert_eq!(a.cache_hash(), b.cache_hash());
    assert_ne!(a.cache_hash(), c.cache_hash());
    assert_ne!(
      ShopQueryKey::AllProducts.cache_hash(),
      ShopQueryKey::Categories.cache_hash()
    );
  }
}
