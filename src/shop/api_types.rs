//! Serde types for request and response envelopes.
//!
//! These are separate from the domain types so the domain stays focused on
//! what the application needs, while the envelopes absorb backend quirks.

use serde::{Deserialize, Serialize};

use super::types::User;

// ============================================================================
// List responses
// ============================================================================

/// A list endpoint answers either with a bare array or with the array
/// wrapped in an object under a resource-specific key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiList<T> {
  Bare(Vec<T>),
  Wrapped(ApiListWrapper<T>),
}

#[derive(Debug, Deserialize)]
pub struct ApiListWrapper<T> {
  #[serde(
    alias = "products",
    alias = "categories",
    alias = "subCategories",
    alias = "subcategories",
    alias = "users",
    alias = "orders",
    alias = "items"
  )]
  pub data: Vec<T>,
}

impl<T> ApiList<T> {
  pub fn into_vec(self) -> Vec<T> {
    match self {
      ApiList::Bare(items) => items,
      ApiList::Wrapped(wrapper) => wrapper.data,
    }
  }
}

/// A single-resource endpoint answers either with the resource itself or
/// with it wrapped under a key. The bare form is tried first so a resource
/// with a populated `category` field is not mistaken for a wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiItem<T> {
  Bare(T),
  Wrapped(ApiItemWrapper<T>),
}

#[derive(Debug, Deserialize)]
pub struct ApiItemWrapper<T> {
  #[serde(alias = "product", alias = "category", alias = "user", alias = "order")]
  pub data: T,
}

impl<T> ApiItem<T> {
  pub fn into_inner(self) -> T {
    match self {
      ApiItem::Bare(item) => item,
      ApiItem::Wrapped(wrapper) => wrapper.data,
    }
  }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
  pub message: Option<String>,
  pub error: Option<String>,
}

impl ApiErrorBody {
  pub fn into_message(self) -> Option<String> {
    self.message.or(self.error)
  }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiLoginRequest<'a> {
  pub email: &'a str,
  pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ApiSignupRequest<'a> {
  pub name: &'a str,
  pub email: &'a str,
  pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ApiForgotPasswordRequest<'a> {
  pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ApiResetPasswordRequest<'a> {
  pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthResponse {
  #[serde(alias = "accessToken")]
  pub token: String,
  pub user: User,
}

// ============================================================================
// Image upload
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUploadResponse {
  pub secure_url: Option<String>,
  pub url: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::shop::types::Product;
  use serde_json::json;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Thing {
    id: u32,
  }

  #[test]
  fn test_list_accepts_bare_and_wrapped() {
    let bare: ApiList<Thing> = serde_json::from_value(json!([{ "id": 1 }])).unwrap();
    assert_eq!(bare.into_vec(), vec![Thing { id: 1 }]);

    let wrapped: ApiList<Thing> =
      serde_json::from_value(json!({ "products": [{ "id": 2 }], "total": 1 })).unwrap();
    assert_eq!(wrapped.into_vec(), vec![Thing { id: 2 }]);
  }

  #[test]
  fn test_item_accepts_bare_and_wrapped() {
    let bare: ApiItem<Thing> = serde_json::from_value(json!({ "id": 1 })).unwrap();
    assert_eq!(bare.into_inner(), Thing { id: 1 });

    let wrapped: ApiItem<Thing> =
      serde_json::from_value(json!({ "product": { "id": 2 } })).unwrap();
    assert_eq!(wrapped.into_inner(), Thing { id: 2 });
  }

  #[test]
  fn test_item_with_populated_category_is_bare() {
    let item: ApiItem<Product> = serde_json::from_value(json!({
      "_id": "p1",
      "name": "Tee",
      "category": { "_id": "c1", "name": "Men" }
    }))
    .unwrap();
    let product = item.into_inner();
    assert_eq!(product.id, "p1");
    assert_eq!(product.category_id.as_deref(), Some("c1"));

    let wrapped: ApiItem<Product> =
      serde_json::from_value(json!({ "product": { "_id": "p2", "name": "Cap" } })).unwrap();
    assert_eq!(wrapped.into_inner().id, "p2");
  }

  #[test]
  fn test_error_body_prefers_message() {
    let body: ApiErrorBody =
      serde_json::from_value(json!({ "message": "Invalid credentials", "error": "x" })).unwrap();
    assert_eq!(body.into_message().as_deref(), Some("Invalid credentials"));
  }
}
