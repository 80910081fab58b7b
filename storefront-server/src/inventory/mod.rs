//! Inventory Guard
//!
//! Stock checks for cart mutations and the atomic check-and-decrement used
//! by order creation. There are no long-lived reservations: stock only moves
//! when an order row is written (decrement) or cancelled (restock).

use crate::orders::{CommerceError, CommerceResult};
use crate::storage::{CommerceStorage, StorageResult};
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use shared::models::Product;
use shared::order::OrderItem;

/// A line that cannot be satisfied from current stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortage {
    pub product_id: String,
    pub requested: u32,
    pub available: u32,
}

/// Check one product against a requested quantity
pub fn check(product: &Product, requested: u32) -> Result<(), StockShortage> {
    let available = if product.is_active { product.stock } else { 0 };
    if requested > available {
        return Err(StockShortage {
            product_id: product.id.clone(),
            requested,
            available,
        });
    }
    Ok(())
}

/// Collect every shortage across `lines`
pub fn check_lines<'a, I>(lines: I) -> Vec<StockShortage>
where
    I: IntoIterator<Item = (&'a Product, u32)>,
{
    lines
        .into_iter()
        .filter_map(|(product, requested)| check(product, requested).err())
        .collect()
}

/// Guard over the catalog's stock column
#[derive(Debug, Clone)]
pub struct InventoryGuard {
    storage: CommerceStorage,
}

impl InventoryGuard {
    pub fn new(storage: CommerceStorage) -> Self {
        Self { storage }
    }

    /// Re-read stock inside `txn`, fail with all shortages, otherwise decrement
    ///
    /// Returns the products as read inside the transaction (pre-decrement
    /// price and name are what the order freezes). A product that vanished
    /// or was deactivated is reported as a shortage with `available = 0`.
    pub fn reserve_in_txn(
        &self,
        txn: &WriteTransaction,
        requests: &[(String, u32)],
    ) -> CommerceResult<Vec<Product>> {
        let mut products = Vec::with_capacity(requests.len());
        let mut shortages = Vec::new();

        for (product_id, requested) in requests {
            match self.storage.get_product_txn(txn, product_id)? {
                Some(product) => {
                    if let Err(shortage) = check(&product, *requested) {
                        shortages.push(shortage);
                    }
                    products.push(product);
                }
                None => shortages.push(StockShortage {
                    product_id: product_id.clone(),
                    requested: *requested,
                    available: 0,
                }),
            }
        }

        if !shortages.is_empty() {
            tracing::info!(shortages = ?shortages, "Stock check failed");
            return Err(CommerceError::OutOfStock(shortages));
        }

        let now = shared::util::now_millis();
        for (product, (_, requested)) in products.iter().zip(requests) {
            let mut updated = product.clone();
            updated.stock -= requested;
            updated.updated_at = now;
            self.storage.store_product(txn, &updated)?;
        }

        Ok(products)
    }

    /// Compensating restock for cancelled order lines
    pub fn release_in_txn(&self, txn: &WriteTransaction, items: &[OrderItem]) -> StorageResult<()> {
        let now = shared::util::now_millis();
        for item in items {
            match self.storage.get_product_txn(txn, &item.product_id)? {
                Some(mut product) => {
                    product.stock = product.stock.saturating_add(item.quantity);
                    product.updated_at = now;
                    self.storage.store_product(txn, &product)?;
                }
                None => {
                    tracing::warn!(product_id = %item.product_id, quantity = item.quantity, "Cannot restock removed product");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(id: &str, stock: u32) -> Product {
        Product {
            id: id.to_string(),
            name: id.to_uppercase(),
            price: dec!(10.00),
            stock,
            discount_percent: dec!(0),
            is_active: true,
            updated_at: 0,
        }
    }

    fn setup(products: &[Product]) -> (CommerceStorage, InventoryGuard) {
        let storage = CommerceStorage::open_in_memory().unwrap();
        for p in products {
            storage.upsert_product(p).unwrap();
        }
        let guard = InventoryGuard::new(storage.clone());
        (storage, guard)
    }

    #[test]
    fn test_check() {
        let p = product("a", 2);
        assert!(check(&p, 2).is_ok());
        let shortage = check(&p, 3).unwrap_err();
        assert_eq!(shortage.requested, 3);
        assert_eq!(shortage.available, 2);
    }

    #[test]
    fn test_inactive_product_has_no_stock() {
        let mut p = product("a", 5);
        p.is_active = false;
        assert_eq!(check(&p, 1).unwrap_err().available, 0);
    }

    #[test]
    fn test_check_lines_reports_all_shortages() {
        let a = product("a", 1);
        let b = product("b", 5);
        let c = product("c", 0);
        let shortages = check_lines([(&a, 2), (&b, 5), (&c, 1)]);
        let ids: Vec<_> = shortages.iter().map(|s| s.product_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_reserve_decrements_on_success() {
        let (storage, guard) = setup(&[product("a", 2), product("b", 3)]);

        let txn = storage.begin_write().unwrap();
        let reserved = guard
            .reserve_in_txn(&txn, &[("a".to_string(), 2), ("b".to_string(), 1)])
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(reserved.len(), 2);
        assert_eq!(storage.get_product("a").unwrap().unwrap().stock, 0);
        assert_eq!(storage.get_product("b").unwrap().unwrap().stock, 2);
    }

    #[test]
    fn test_reserve_fails_without_touching_stock() {
        let (storage, guard) = setup(&[product("a", 2), product("b", 3)]);

        let txn = storage.begin_write().unwrap();
        let err = guard
            .reserve_in_txn(
                &txn,
                &[
                    ("a".to_string(), 1),
                    ("b".to_string(), 4),
                    ("ghost".to_string(), 1),
                ],
            )
            .unwrap_err();
        drop(txn);

        match err {
            CommerceError::OutOfStock(shortages) => {
                assert_eq!(shortages.len(), 2);
                assert_eq!(shortages[1].product_id, "ghost");
                assert_eq!(shortages[1].available, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(storage.get_product("a").unwrap().unwrap().stock, 2);
        assert_eq!(storage.get_product("b").unwrap().unwrap().stock, 3);
    }

    #[test]
    fn test_release_restocks() {
        let (storage, guard) = setup(&[product("a", 0)]);
        let txn = storage.begin_write().unwrap();
        guard
            .release_in_txn(
                &txn,
                &[OrderItem {
                    product_id: "a".to_string(),
                    name: "A".to_string(),
                    quantity: 2,
                    unit_price: dec!(10.00),
                    subtotal: dec!(20.00),
                }],
            )
            .unwrap();
        txn.commit().unwrap();
        assert_eq!(storage.get_product("a").unwrap().unwrap().stock, 2);
    }
}
