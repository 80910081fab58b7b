//! Money calculation using rust_decimal
//!
//! One pricing routine feeds both the cart view and order creation, so the
//! totals a customer sees in the cart are the totals the order freezes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::util::round_money;

/// Maximum allowed quantity per line
pub const MAX_QUANTITY: u32 = 9999;

/// Shipping and tax rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Orders with a subtotal at or above this ship free
    pub free_shipping_threshold: Decimal,
    pub flat_shipping_fee: Decimal,
    /// Fraction, e.g. 0.18 for 18%
    pub tax_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Decimal::new(100, 0),
            flat_shipping_fee: Decimal::new(10, 0),
            tax_rate: Decimal::ZERO,
        }
    }
}

/// Computed order/cart totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// unit_price × quantity, rounded to cents
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    round_money(unit_price * Decimal::from(quantity))
}

/// Shipping for a given subtotal (nothing to ship → no fee)
pub fn shipping_for(subtotal: Decimal, pricing: &PricingConfig) -> Decimal {
    if subtotal.is_zero() || subtotal >= pricing.free_shipping_threshold {
        Decimal::ZERO
    } else {
        round_money(pricing.flat_shipping_fee)
    }
}

/// Price `(unit_price, quantity)` lines
///
/// `total = subtotal + shipping_cost + tax` holds exactly; every component is
/// already rounded to cents.
pub fn price_lines<I>(lines: I, pricing: &PricingConfig) -> Totals
where
    I: IntoIterator<Item = (Decimal, u32)>,
{
    let subtotal: Decimal = lines
        .into_iter()
        .map(|(unit_price, quantity)| line_total(unit_price, quantity))
        .sum();
    let subtotal = round_money(subtotal);
    let shipping_cost = shipping_for(subtotal, pricing);
    let tax = round_money(subtotal * pricing.tax_rate);

    Totals {
        subtotal,
        shipping_cost,
        tax,
        total: subtotal + shipping_cost + tax,
    }
}
