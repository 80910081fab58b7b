//! Data models
//!
//! Shared between storefront-server and its clients (via API).

pub mod cart;
pub mod product;

// Re-exports
pub use cart::*;
pub use product::*;
