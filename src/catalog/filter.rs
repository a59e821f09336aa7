//! Narrowing and ordering of an already-fetched product list.

use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::shop::Product;

/// Price range with an inclusive lower and exclusive upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceBucket {
  pub min: Option<Decimal>,
  pub max: Option<Decimal>,
}

impl PriceBucket {
  pub fn contains(&self, price: Decimal) -> bool {
    self.min.map_or(true, |min| price >= min) && self.max.map_or(true, |max| price < max)
  }
}

impl FromStr for PriceBucket {
  type Err = String;

  /// Accepts `MIN-MAX`, `MIN+` and `-MAX`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    let parse = |v: &str| {
      Decimal::from_str(v.trim()).map_err(|e| format!("invalid price '{}': {}", v.trim(), e))
    };

    let bucket = if let Some(min) = s.strip_suffix('+') {
      PriceBucket {
        min: Some(parse(min)?),
        max: None,
      }
    } else if let Some(max) = s.strip_prefix('-') {
      PriceBucket {
        min: None,
        max: Some(parse(max)?),
      }
    } else if let Some((min, max)) = s.split_once('-') {
      PriceBucket {
        min: Some(parse(min)?),
        max: Some(parse(max)?),
      }
    } else {
      return Err(format!(
        "invalid price bucket '{}': use MIN-MAX, MIN+ or -MAX",
        s
      ));
    };

    if let (Some(min), Some(max)) = (bucket.min, bucket.max) {
      if min >= max {
        return Err(format!("empty price bucket '{}'", s));
      }
    }
    Ok(bucket)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortKey {
  /// Lowest price first
  PriceAsc,
  /// Highest price first
  PriceDesc,
  /// Most recently created first
  Newest,
  /// Best rated first
  Rating,
}

/// Predicates for a product listing page. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
  pub category_id: Option<String>,
  pub sub_category_id: Option<String>,
  pub price: Option<PriceBucket>,
  pub color: Option<String>,
  pub free_shipping: bool,
  pub max_delivery_days: Option<u32>,
}

impl ListingFilter {
  pub fn matches(&self, product: &Product) -> bool {
    if let Some(category) = &self.category_id {
      if product.category_id.as_deref() != Some(category.as_str()) {
        return false;
      }
    }
    if let Some(sub_category) = &self.sub_category_id {
      if product.sub_category_id.as_deref() != Some(sub_category.as_str()) {
        return false;
      }
    }
    if let Some(bucket) = &self.price {
      if !product
        .variations
        .iter()
        .any(|v| bucket.contains(v.price.effective()))
      {
        return false;
      }
    }
    if let Some(color) = &self.color {
      let color = color.trim();
      if !product.variations.iter().any(|v| {
        v.attributes
          .color
          .as_deref()
          .is_some_and(|c| c.trim().eq_ignore_ascii_case(color))
      }) {
        return false;
      }
    }
    if self.free_shipping && !product.variations.iter().any(|v| v.shipping.free_shipping) {
      return false;
    }
    if let Some(max_days) = self.max_delivery_days {
      if !product.variations.iter().any(|v| {
        v.shipping
          .estimated_delivery_days
          .is_some_and(|days| days <= max_days)
      }) {
        return false;
      }
    }
    true
  }

  pub fn apply<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
    products.iter().filter(|p| self.matches(p)).collect()
  }
}

/// Stable sort by `key`. Products lacking the sort field keep their
/// relative order after all others.
pub fn sort_products(products: &mut [&Product], key: SortKey) {
  match key {
    SortKey::PriceAsc => {
      products.sort_by(|a, b| missing_last(a.lowest_price(), b.lowest_price(), |x, y| x.cmp(&y)))
    }
    SortKey::PriceDesc => {
      products.sort_by(|a, b| missing_last(a.lowest_price(), b.lowest_price(), |x, y| y.cmp(&x)))
    }
    SortKey::Newest => {
      products.sort_by(|a, b| missing_last(a.created_at, b.created_at, |x, y| y.cmp(&x)))
    }
    SortKey::Rating => {
      products.sort_by(|a, b| missing_last(a.rating, b.rating, |x, y| y.total_cmp(&x)))
    }
  }
}

fn missing_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(T, T) -> Ordering) -> Ordering {
  match (a, b) {
    (Some(a), Some(b)) => cmp(a, b),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
}
