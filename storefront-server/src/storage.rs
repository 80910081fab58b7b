//! redb-based storage layer for catalog, carts and orders
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `products` | `product_id` | `Product` | Catalog (price, stock, active flag) |
//! | `cart_items` | `(user_id, product_id)` | `CartItem` | One line per product per user |
//! | `orders` | `order_id` | `Order` | Order aggregate (items, attempts, timeline) |
//! | `payment_refs` | `payment_reference` | `order_id` | Gateway / manual-proof reference lookup |
//! | `user_orders` | `(user_id, order_id)` | `()` | Order history index |
//! | `processed_webhooks` | `event_id` | `order_id` | Webhook idempotency |
//!
//! # Atomicity
//!
//! redb serialises write transactions. Every cart mutation, order creation and
//! status transition runs as a single write transaction, so a read-check-write
//! sequence on stock or on an order row can never interleave with another one.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use shared::models::{CartItem, Product};
use shared::order::Order;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// key = product_id, value = JSON-serialized Product
const PRODUCTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("products");

/// key = (user_id, product_id), value = JSON-serialized CartItem
const CART_ITEMS_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("cart_items");

/// key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// key = payment_reference, value = order_id
const PAYMENT_REFS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("payment_refs");

/// key = (user_id, order_id), value = empty (existence index)
const USER_ORDERS_TABLE: TableDefinition<(&str, &str), ()> = TableDefinition::new("user_orders");

/// key = gateway event id, value = order_id
const PROCESSED_WEBHOOKS_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("processed_webhooks");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storefront storage backed by redb
#[derive(Clone)]
pub struct CommerceStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for CommerceStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceStorage").finish_non_exhaustive()
    }
}

impl CommerceStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns the order row and the stock decrement are both on disk.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests and demos)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        // Create all tables so read transactions never see a missing table
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PRODUCTS_TABLE)?;
            let _ = write_txn.open_table(CART_ITEMS_TABLE)?;
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(PAYMENT_REFS_TABLE)?;
            let _ = write_txn.open_table(USER_ORDERS_TABLE)?;
            let _ = write_txn.open_table(PROCESSED_WEBHOOKS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Products ==========

    pub fn get_product(&self, product_id: &str) -> StorageResult<Option<Product>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRODUCTS_TABLE)?;

        match table.get(product_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_product_txn(
        &self,
        txn: &WriteTransaction,
        product_id: &str,
    ) -> StorageResult<Option<Product>> {
        let table = txn.open_table(PRODUCTS_TABLE)?;

        match table.get(product_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn store_product(&self, txn: &WriteTransaction, product: &Product) -> StorageResult<()> {
        let mut table = txn.open_table(PRODUCTS_TABLE)?;
        let value = serde_json::to_vec(product)?;
        table.insert(product.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Insert or replace a catalog entry in its own transaction
    pub fn upsert_product(&self, product: &Product) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        self.store_product(&txn, product)?;
        txn.commit()?;
        Ok(())
    }

    // ========== Cart ==========

    /// All cart lines of a user, ordered by product id
    pub fn get_cart_items(&self, user_id: &str) -> StorageResult<Vec<CartItem>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CART_ITEMS_TABLE)?;

        let mut items = Vec::new();
        for result in table.range((user_id, "")..)? {
            let (key, value) = result?;
            if key.value().0 != user_id {
                break;
            }
            items.push(serde_json::from_slice(value.value())?);
        }
        Ok(items)
    }

    /// Cart lines joined with their current catalog entry, read in one snapshot
    pub fn get_cart_with_products(
        &self,
        user_id: &str,
    ) -> StorageResult<Vec<(CartItem, Option<Product>)>> {
        let read_txn = self.db.begin_read()?;
        let cart = read_txn.open_table(CART_ITEMS_TABLE)?;
        let products = read_txn.open_table(PRODUCTS_TABLE)?;

        let mut lines = Vec::new();
        for result in cart.range((user_id, "")..)? {
            let (key, value) = result?;
            let (owner, product_id) = key.value();
            if owner != user_id {
                break;
            }
            let item: CartItem = serde_json::from_slice(value.value())?;
            let product = match products.get(product_id)? {
                Some(p) => Some(serde_json::from_slice(p.value())?),
                None => None,
            };
            lines.push((item, product));
        }
        Ok(lines)
    }

    pub fn get_cart_item_txn(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
        product_id: &str,
    ) -> StorageResult<Option<CartItem>> {
        let table = txn.open_table(CART_ITEMS_TABLE)?;

        match table.get((user_id, product_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn store_cart_item(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
        item: &CartItem,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(CART_ITEMS_TABLE)?;
        let value = serde_json::to_vec(item)?;
        table.insert((user_id, item.product_id.as_str()), value.as_slice())?;
        Ok(())
    }

    /// Returns whether a line was removed
    pub fn remove_cart_item(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
        product_id: &str,
    ) -> StorageResult<bool> {
        let mut table = txn.open_table(CART_ITEMS_TABLE)?;
        let removed = table.remove((user_id, product_id))?.is_some();
        Ok(removed)
    }

    /// Remove every line of a user; returns the number removed
    pub fn clear_cart(&self, txn: &WriteTransaction, user_id: &str) -> StorageResult<usize> {
        let mut table = txn.open_table(CART_ITEMS_TABLE)?;

        let mut product_ids = Vec::new();
        for result in table.range((user_id, "")..)? {
            let (key, _) = result?;
            let (owner, product_id) = key.value();
            if owner != user_id {
                break;
            }
            product_ids.push(product_id.to_string());
        }

        for product_id in &product_ids {
            table.remove((user_id, product_id.as_str()))?;
        }
        Ok(product_ids.len())
    }

    // ========== Orders ==========

    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(order.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Add an order to its owner's history index
    pub fn index_user_order(
        &self,
        txn: &WriteTransaction,
        user_id: &str,
        order_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(USER_ORDERS_TABLE)?;
        table.insert((user_id, order_id), ())?;
        Ok(())
    }

    /// Orders of a user, newest first
    pub fn get_orders_for_user(&self, user_id: &str) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USER_ORDERS_TABLE)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;

        let mut result = Vec::new();
        for entry in index.range((user_id, "")..)? {
            let (key, _) = entry?;
            let (owner, order_id) = key.value();
            if owner != user_id {
                break;
            }
            if let Some(value) = orders.get(order_id)? {
                let order: Order = serde_json::from_slice(value.value())?;
                result.push(order);
            } else {
                tracing::warn!(user_id = %user_id, order_id = %order_id, "Dangling user_orders entry");
            }
        }

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    // ========== Payment references ==========

    pub fn store_payment_ref(
        &self,
        txn: &WriteTransaction,
        reference: &str,
        order_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(PAYMENT_REFS_TABLE)?;
        table.insert(reference, order_id)?;
        Ok(())
    }

    pub fn find_order_by_reference_txn(
        &self,
        txn: &WriteTransaction,
        reference: &str,
    ) -> StorageResult<Option<String>> {
        let table = txn.open_table(PAYMENT_REFS_TABLE)?;
        Ok(table.get(reference)?.map(|guard| guard.value().to_string()))
    }

    // ========== Webhook idempotency ==========

    pub fn is_webhook_processed_txn(
        &self,
        txn: &WriteTransaction,
        event_id: &str,
    ) -> StorageResult<bool> {
        let table = txn.open_table(PROCESSED_WEBHOOKS_TABLE)?;
        Ok(table.get(event_id)?.is_some())
    }

    pub fn mark_webhook_processed(
        &self,
        txn: &WriteTransaction,
        event_id: &str,
        order_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(PROCESSED_WEBHOOKS_TABLE)?;
        table.insert(event_id, order_id)?;
        Ok(())
    }
}
