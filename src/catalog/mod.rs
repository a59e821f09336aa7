//! Product catalog: the cached product list and what can be done with it
//! locally.

mod filter;
mod provider;
mod search;

pub use filter::{sort_products, ListingFilter, PriceBucket, SortKey};
pub use provider::{CatalogState, ProductProvider};
