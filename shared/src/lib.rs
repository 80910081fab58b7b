//! Shared types for the storefront
//!
//! Types used by both the server and its clients: error codes and the API
//! envelope, catalog/cart models, and the order aggregate with its status
//! state machine.

pub mod error;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};
