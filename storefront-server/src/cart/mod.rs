//! Cart Store
//!
//! Per-user cart lines persisted in redb. Every mutation is one write
//! transaction (read line, check stock, write line), and every response is a
//! freshly priced [`CartView`] so clients never add up totals themselves.

use crate::inventory::{self, StockShortage};
use crate::orders::money::{MAX_QUANTITY, PricingConfig, line_total, price_lines};
use crate::orders::{CommerceError, CommerceResult, Resource};
use crate::storage::CommerceStorage;
use shared::models::{CartItem, CartLineView, CartView, Product};

/// Cart line with the product as read right now
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshotLine {
    pub product: Product,
    pub quantity: u32,
}

/// Validated cart contents handed to checkout
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    pub user_id: String,
    pub lines: Vec<CartSnapshotLine>,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// `(product_id, quantity)` pairs for the inventory guard
    pub fn requests(&self) -> Vec<(String, u32)> {
        self.lines
            .iter()
            .map(|l| (l.product.id.clone(), l.quantity))
            .collect()
    }
}

/// Reject zero, negative and absurd quantities
fn validate_quantity(quantity: i64) -> CommerceResult<u32> {
    if quantity < 1 || quantity > i64::from(MAX_QUANTITY) {
        return Err(CommerceError::InvalidQuantity {
            quantity,
            max: MAX_QUANTITY,
        });
    }
    Ok(quantity as u32)
}

#[derive(Debug, Clone)]
pub struct CartStore {
    storage: CommerceStorage,
    pricing: PricingConfig,
}

impl CartStore {
    pub fn new(storage: CommerceStorage, pricing: PricingConfig) -> Self {
        Self { storage, pricing }
    }

    /// Add `quantity` units, merging with an existing line
    pub fn add(&self, user_id: &str, product_id: &str, quantity: i64) -> CommerceResult<CartView> {
        let quantity = validate_quantity(quantity)?;

        let txn = self.storage.begin_write()?;
        let product = self
            .storage
            .get_product_txn(&txn, product_id)?
            .filter(|p| p.is_active)
            .ok_or_else(|| CommerceError::NotFound(Resource::Product(product_id.to_string())))?;

        let now = shared::util::now_millis();
        let existing = self.storage.get_cart_item_txn(&txn, user_id, product_id)?;
        let merged = existing.as_ref().map_or(0, |i| i.quantity) as i64 + quantity as i64;
        let merged = validate_quantity(merged)?;
        inventory::check(&product, merged).map_err(|s| CommerceError::OutOfStock(vec![s]))?;

        let item = CartItem {
            product_id: product.id.clone(),
            quantity: merged,
            unit_price_at_add: product.effective_price(),
            added_at: existing.map_or(now, |i| i.added_at),
            updated_at: now,
        };
        self.storage.store_cart_item(&txn, user_id, &item)?;
        txn.commit()?;

        tracing::debug!(user_id = %user_id, product_id = %product_id, quantity = merged, "Cart line added");
        self.view(user_id)
    }

    /// Set the quantity of an existing line
    ///
    /// On any failure the stored quantity is left as it was.
    pub fn update(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> CommerceResult<CartView> {
        let quantity = validate_quantity(quantity)?;

        let txn = self.storage.begin_write()?;
        let mut item = self
            .storage
            .get_cart_item_txn(&txn, user_id, product_id)?
            .ok_or_else(|| CommerceError::NotFound(Resource::CartItem(product_id.to_string())))?;
        let product = self
            .storage
            .get_product_txn(&txn, product_id)?
            .ok_or_else(|| CommerceError::NotFound(Resource::Product(product_id.to_string())))?;
        inventory::check(&product, quantity).map_err(|s| CommerceError::OutOfStock(vec![s]))?;

        item.quantity = quantity;
        item.updated_at = shared::util::now_millis();
        self.storage.store_cart_item(&txn, user_id, &item)?;
        txn.commit()?;

        self.view(user_id)
    }

    /// Remove one line; removing a missing line is not an error
    pub fn remove(&self, user_id: &str, product_id: &str) -> CommerceResult<CartView> {
        let txn = self.storage.begin_write()?;
        let removed = self.storage.remove_cart_item(&txn, user_id, product_id)?;
        txn.commit()?;

        if !removed {
            tracing::debug!(user_id = %user_id, product_id = %product_id, "Cart line already absent");
        }
        self.view(user_id)
    }

    pub fn clear(&self, user_id: &str) -> CommerceResult<CartView> {
        let txn = self.storage.begin_write()?;
        let removed = self.storage.clear_cart(&txn, user_id)?;
        txn.commit()?;

        tracing::debug!(user_id = %user_id, removed, "Cart cleared");
        self.view(user_id)
    }

    /// Cart lines with freshly read products
    ///
    /// Lines whose product no longer exists are reported as shortages.
    pub fn snapshot(&self, user_id: &str) -> CommerceResult<CartSnapshot> {
        let mut lines = Vec::new();
        let mut missing = Vec::new();

        for (item, product) in self.storage.get_cart_with_products(user_id)? {
            match product {
                Some(product) => lines.push(CartSnapshotLine {
                    product,
                    quantity: item.quantity,
                }),
                None => missing.push(StockShortage {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available: 0,
                }),
            }
        }

        if !missing.is_empty() {
            return Err(CommerceError::OutOfStock(missing));
        }

        Ok(CartSnapshot {
            user_id: user_id.to_string(),
            lines,
        })
    }

    /// Cart priced from the current catalog
    pub fn view(&self, user_id: &str) -> CommerceResult<CartView> {
        let mut items = Vec::new();
        for (item, product) in self.storage.get_cart_with_products(user_id)? {
            let Some(product) = product else {
                tracing::warn!(user_id = %user_id, product_id = %item.product_id, "Cart line references a missing product");
                continue;
            };
            let unit_price = product.effective_price();
            items.push(CartLineView {
                product_id: product.id,
                name: product.name,
                quantity: item.quantity,
                unit_price,
                line_total: line_total(unit_price, item.quantity),
                available_stock: if product.is_active { product.stock } else { 0 },
            });
        }

        let totals = price_lines(
            items.iter().map(|l| (l.unit_price, l.quantity)),
            &self.pricing,
        );

        Ok(CartView {
            item_count: items.iter().map(|l| l.quantity).sum(),
            items,
            subtotal: totals.subtotal,
            shipping_cost: totals.shipping_cost,
            tax: totals.tax,
            total: totals.total,
        })
    }
}
