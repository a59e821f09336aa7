//! Domain types for the storefront backend.
//!
//! The backend speaks camelCase JSON and names ids `_id`; both spellings are
//! accepted on input.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub images: Vec<String>,
  #[serde(default)]
  pub variations: Vec<Variation>,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub attributes: ProductAttributes,
  #[serde(default, alias = "category", deserialize_with = "id_ref")]
  pub category_id: Option<String>,
  #[serde(default, alias = "subCategory", deserialize_with = "id_ref")]
  pub sub_category_id: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub rating: Option<f64>,
}

impl Product {
  /// Lowest effective price across variations.
  pub fn lowest_price(&self) -> Option<Decimal> {
    self.variations.iter().map(|v| v.price.effective()).min()
  }

  /// First product image, falling back to the first variation image.
  pub fn thumbnail(&self) -> Option<&str> {
    self
      .images
      .first()
      .or_else(|| self.variations.iter().find_map(|v| v.images.first()))
      .map(String::as_str)
  }

  /// Find a variation by name, case-insensitively.
  pub fn variation(&self, name: &str) -> Option<&Variation> {
    self
      .variations
      .iter()
      .find(|v| v.name.eq_ignore_ascii_case(name))
  }
}

/// Free-text product attributes. Keys beyond the named ones are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAttributes {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub material: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gender: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub season: Option<String>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, serde_json::Value>,
}

/// Purchasable configuration of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
  #[serde(default, alias = "_id")]
  pub id: Option<String>,
  #[serde(default)]
  pub sku: String,
  pub name: String,
  #[serde(default)]
  pub attributes: VariationAttributes,
  pub price: Price,
  #[serde(default)]
  pub stock: u32,
  #[serde(default)]
  pub inventory_status: InventoryStatus,
  #[serde(default)]
  pub shipping: Shipping,
  #[serde(default)]
  pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationAttributes {
  #[serde(default)]
  pub color: Option<String>,
  #[serde(default)]
  pub size: Option<String>,
  #[serde(default)]
  pub material: Option<String>,
  #[serde(default)]
  pub weight: Option<String>,
}

/// Price record. The discounted price is not checked against the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
  pub original_price: Decimal,
  #[serde(default)]
  pub discounted_price: Option<Decimal>,
  #[serde(default = "default_currency")]
  pub currency: String,
}

/// A reference to another resource, sent either as its id or populated
/// with the resource itself.
fn id_ref<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum IdRef {
    Id(String),
    Populated {
      #[serde(alias = "_id")]
      id: String,
    },
  }

  Ok(Option::<IdRef>::deserialize(deserializer)?.map(|r| match r {
    IdRef::Id(id) => id,
    IdRef::Populated { id } => id,
  }))
}

fn default_currency() -> String {
  "USD".to_string()
}

impl Price {
  /// The price a buyer pays: the discounted price when one is set and
  /// positive, else the original price.
  pub fn effective(&self) -> Decimal {
    match self.discounted_price {
      Some(discounted) if discounted > Decimal::ZERO => discounted,
      _ => self.original_price,
    }
  }

  pub fn is_discounted(&self) -> bool {
    self.effective() != self.original_price
  }

  pub fn display(&self) -> String {
    format!("{:.2} {}", self.effective(), self.currency)
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
  #[default]
  #[serde(alias = "in-stock", alias = "inStock", alias = "In Stock")]
  InStock,
  #[serde(alias = "out-of-stock", alias = "outOfStock", alias = "Out of Stock")]
  OutOfStock,
  #[serde(alias = "Backorder", alias = "back-order")]
  Backorder,
}

impl InventoryStatus {
  pub fn label(&self) -> &'static str {
    match self {
      InventoryStatus::InStock => "in stock",
      InventoryStatus::OutOfStock => "out of stock",
      InventoryStatus::Backorder => "backorder",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipping {
  #[serde(default)]
  pub charge: Decimal,
  #[serde(default)]
  pub free_shipping: bool,
  #[serde(default)]
  pub estimated_delivery_days: Option<u32>,
}

/// Top-level product category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategory {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default, alias = "category", deserialize_with = "id_ref")]
  pub category_id: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
}

/// Body for creating or updating a category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInput {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  User,
  Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub role: Role,
  #[serde(default)]
  pub addresses: Vec<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
  #[serde(default)]
  pub street: String,
  #[serde(default)]
  pub city: String,
  #[serde(default)]
  pub state: Option<String>,
  #[serde(default)]
  pub postal_code: String,
  #[serde(default)]
  pub country: String,
}

impl std::fmt::Display for Address {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}, {}", self.street, self.city)?;
    if let Some(state) = &self.state {
      write!(f, ", {}", state)?;
    }
    write!(f, " {}, {}", self.postal_code, self.country)
  }
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub addresses: Option<Vec<Address>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  #[serde(alias = "_id")]
  pub id: String,
  #[serde(default, alias = "items")]
  pub line_items: Vec<OrderLine>,
  pub total: Decimal,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
  #[serde(default, alias = "product")]
  pub product_id: String,
  #[serde(default)]
  pub name: String,
  pub quantity: u32,
  pub price: Decimal,
}
