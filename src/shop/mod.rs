//! Storefront backend: REST client, wire types and cached catalog reads.

mod api_types;
mod cache;
mod cached_client;
mod client;
mod error;
mod types;
mod upload;

pub use cache::ShopQueryKey;
pub use cached_client::CachedShopClient;
pub use client::ShopClient;
pub use error::ApiError;
pub use types::{Address, CategoryInput, InventoryStatus, Product, ProfileUpdate, Role, User};
pub use upload::ImageUploader;
