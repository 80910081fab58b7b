//! Product Model
//!
//! The catalog is owned by the admin surface; the order engine only reads it
//! and adjusts `stock` inside its own transactions.

use crate::util::round_money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// List price before discount
    pub price: Decimal,
    /// Units available for sale
    pub stock: u32,
    /// Discount in percent (e.g. 15 = 15% off)
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub updated_at: i64,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Authoritative unit price: list price minus discount, rounded to cents
    pub fn effective_price(&self) -> Decimal {
        if self.discount_percent.is_zero() {
            return round_money(self.price);
        }
        let factor = (Decimal::ONE_HUNDRED - self.discount_percent) / Decimal::ONE_HUNDRED;
        round_money(self.price * factor)
    }
}
