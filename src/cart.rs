//! Client-side shopping cart.
//!
//! Line items live only in the local store. Nothing here reserves stock or
//! talks to the backend; prices are a snapshot taken when the line was added.

use color_eyre::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::LocalStore;
use crate::shop::{InventoryStatus, Product};

const CART_KEY: &str = "cart";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
  #[error("quantity must be at least 1")]
  ZeroQuantity,
  #[error("no cart line at position {0}")]
  NoSuchLine(usize),
  #[error("product {product} has no variation named '{variation}'")]
  UnknownVariation { product: String, variation: String },
  #[error("product {0} has no variations to buy")]
  NoVariations(String),
  #[error("{0} is out of stock")]
  OutOfStock(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
  pub product_id: String,
  pub product_name: String,
  pub variation_name: String,
  pub color: Option<String>,
  pub size: Option<String>,
  pub quantity: u32,
  pub unit_price: Decimal,
  pub thumbnail: Option<String>,
}

impl CartItem {
  /// Build a line for one variation of a product. Without a variation name
  /// the first variation is used.
  pub fn for_product(
    product: &Product,
    variation: Option<&str>,
    quantity: u32,
  ) -> std::result::Result<Self, CartError> {
    if quantity == 0 {
      return Err(CartError::ZeroQuantity);
    }

    let chosen = match variation {
      Some(name) => product
        .variation(name)
        .ok_or_else(|| CartError::UnknownVariation {
          product: product.id.clone(),
          variation: name.to_string(),
        })?,
      None => product
        .variations
        .first()
        .ok_or_else(|| CartError::NoVariations(product.id.clone()))?,
    };

    if chosen.inventory_status == InventoryStatus::OutOfStock {
      return Err(CartError::OutOfStock(format!(
        "{} ({})",
        product.name, chosen.name
      )));
    }

    Ok(Self {
      product_id: product.id.clone(),
      product_name: product.name.clone(),
      variation_name: chosen.name.clone(),
      color: chosen.attributes.color.clone(),
      size: chosen.attributes.size.clone(),
      quantity,
      unit_price: chosen.price.effective(),
      thumbnail: chosen
        .images
        .first()
        .map(String::as_str)
        .or_else(|| product.thumbnail())
        .map(String::from),
    })
  }

  pub fn line_total(&self) -> Decimal {
    self.unit_price * Decimal::from(self.quantity)
  }

  fn same_line(&self, other: &CartItem) -> bool {
    self.product_id == other.product_id
      && self.variation_name == other.variation_name
      && self.color == other.color
      && self.size == other.size
  }
}

/// Cart contents, loaded from and saved to the local store on every change.
pub struct Cart<'a> {
  store: &'a LocalStore,
}

impl<'a> Cart<'a> {
  pub fn new(store: &'a LocalStore) -> Self {
    Self { store }
  }

  pub fn items(&self) -> Result<Vec<CartItem>> {
    Ok(self.store.get(CART_KEY)?.unwrap_or_default())
  }

  fn save(&self, items: &[CartItem]) -> Result<()> {
    if items.is_empty() {
      self.store.remove(CART_KEY)
    } else {
      self.store.set(CART_KEY, &items)
    }
  }

  /// Add a line, merging quantities with an identical existing line.
  pub fn add(&self, item: CartItem) -> Result<Vec<CartItem>> {
    if item.quantity == 0 {
      return Err(CartError::ZeroQuantity.into());
    }

    let mut items = self.items()?;
    match items.iter_mut().find(|existing| existing.same_line(&item)) {
      Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
      None => items.push(item),
    }
    self.save(&items)?;
    Ok(items)
  }

  /// Set the quantity of the line at `index`; zero removes the line.
  pub fn set_quantity(&self, index: usize, quantity: u32) -> Result<Vec<CartItem>> {
    if quantity == 0 {
      return self.remove(index);
    }

    let mut items = self.items()?;
    let line = items
      .get_mut(index)
      .ok_or(CartError::NoSuchLine(index))?;
    line.quantity = quantity;
    self.save(&items)?;
    Ok(items)
  }

  pub fn remove(&self, index: usize) -> Result<Vec<CartItem>> {
    let mut items = self.items()?;
    if index >= items.len() {
      return Err(CartError::NoSuchLine(index).into());
    }
    items.remove(index);
    self.save(&items)?;
    Ok(items)
  }

  pub fn clear(&self) -> Result<()> {
    self.store.remove(CART_KEY)
  }
}

/// Sum of line totals.
pub fn subtotal(items: &[CartItem]) -> Decimal {
  items.iter().map(CartItem::line_total).sum()
}

/// Number of units across all lines.
pub fn item_count(items: &[CartItem]) -> u32 {
  items.iter().map(|i| i.quantity).sum()
}
