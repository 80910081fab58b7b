//! Cart Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stored cart line (one per user + product)
///
/// `unit_price_at_add` is a display cache only; every total is recomputed
/// from the current product price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_at_add: Decimal,
    pub added_at: i64,
    pub updated_at: i64,
}

/// Cart line as returned to clients, priced from the current catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineView {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub available_stock: u32,
}

/// Server-authoritative cart with recomputed totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    /// Sum of quantities across all lines
    pub item_count: u32,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Add-to-cart payload
///
/// Quantity is signed so that zero/negative input reaches validation
/// instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Update-quantity payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i64,
}
