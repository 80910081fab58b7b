//! Order Builder
//!
//! Two steps around payment initiation:
//!
//! ```text
//! draft(snapshot)                      pure: validate + price, new order id
//!     └─ strategy.initiate(draft)      outside any transaction
//! create_order(draft, initiation)
//!     ├─ 1. Begin write transaction
//!     ├─ 2. Re-read stock, fail with every shortage
//!     ├─ 3. Re-price; abort if prices moved since the draft
//!     ├─ 4. Decrement stock
//!     ├─ 5. Persist order + user index + payment reference
//!     └─ 6. Commit (all or nothing)
//! ```
//!
//! The builder never touches the cart.

use super::error::{CommerceError, CommerceResult};
use super::money::{PricingConfig, Totals, line_total, price_lines};
use crate::cart::CartSnapshot;
use crate::inventory::{self, InventoryGuard};
use crate::payments::Initiation;
use crate::storage::CommerceStorage;
use shared::order::{
    Order, OrderItem, OrderStatus, PaymentAttempt, PaymentMethod, ShippingInfo, StatusTimeline,
};

/// Priced, validated order that does not exist yet
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    /// Pre-generated so the gateway preference can reference it
    pub order_id: String,
    pub user_id: String,
    pub payment_method: PaymentMethod,
    pub shipping_info: ShippingInfo,
    pub items: Vec<OrderItem>,
    pub totals: Totals,
}

#[derive(Debug, Clone)]
pub struct OrderBuilder {
    storage: CommerceStorage,
    inventory: InventoryGuard,
    pricing: PricingConfig,
}

impl OrderBuilder {
    pub fn new(storage: CommerceStorage, pricing: PricingConfig) -> Self {
        Self {
            inventory: InventoryGuard::new(storage.clone()),
            storage,
            pricing,
        }
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Validate a cart snapshot and price it
    ///
    /// Fails early (before any payment call) on an empty cart, missing
    /// shipping fields or insufficient stock.
    pub fn draft(
        &self,
        user_id: &str,
        shipping_info: ShippingInfo,
        payment_method: PaymentMethod,
        snapshot: &CartSnapshot,
    ) -> CommerceResult<OrderDraft> {
        if snapshot.is_empty() {
            return Err(CommerceError::CartEmpty);
        }

        let missing = shipping_info.missing_fields();
        if !missing.is_empty() {
            return Err(CommerceError::Validation(format!(
                "Missing shipping fields: {}",
                missing.join(", ")
            )));
        }

        let shortages =
            inventory::check_lines(snapshot.lines.iter().map(|l| (&l.product, l.quantity)));
        if !shortages.is_empty() {
            return Err(CommerceError::OutOfStock(shortages));
        }

        let items: Vec<OrderItem> = snapshot
            .lines
            .iter()
            .map(|line| {
                let unit_price = line.product.effective_price();
                OrderItem {
                    product_id: line.product.id.clone(),
                    name: line.product.name.clone(),
                    quantity: line.quantity,
                    unit_price,
                    subtotal: line_total(unit_price, line.quantity),
                }
            })
            .collect();
        let totals = price_lines(items.iter().map(|i| (i.unit_price, i.quantity)), &self.pricing);

        Ok(OrderDraft {
            order_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            payment_method,
            shipping_info,
            items,
            totals,
        })
    }

    /// Persist the order and decrement stock in one transaction
    pub fn create_order(
        &self,
        draft: &OrderDraft,
        initiation: &Initiation,
    ) -> CommerceResult<Order> {
        if draft.items.is_empty() {
            return Err(CommerceError::CartEmpty);
        }

        let requests: Vec<(String, u32)> = draft
            .items
            .iter()
            .map(|i| (i.product_id.clone(), i.quantity))
            .collect();

        let txn = self.storage.begin_write()?;
        let products = self.inventory.reserve_in_txn(&txn, &requests)?;

        // Prices as read inside the transaction are authoritative
        let items: Vec<OrderItem> = products
            .iter()
            .zip(&draft.items)
            .map(|(product, drafted)| {
                let unit_price = product.effective_price();
                OrderItem {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    quantity: drafted.quantity,
                    unit_price,
                    subtotal: line_total(unit_price, drafted.quantity),
                }
            })
            .collect();
        let totals = price_lines(items.iter().map(|i| (i.unit_price, i.quantity)), &self.pricing);
        // The payment was initiated with the drafted amounts
        let repriced = items
            .iter()
            .zip(&draft.items)
            .any(|(now, drafted)| now.unit_price != drafted.unit_price);
        if repriced || totals != draft.totals {
            tracing::warn!(
                order_id = %draft.order_id,
                drafted_total = %draft.totals.total,
                total = %totals.total,
                "Prices changed between draft and order creation"
            );
            return Err(CommerceError::PriceChanged {
                expected: draft.totals.total,
                actual: totals.total,
            });
        }

        let now = shared::util::now_millis();
        let attempt = PaymentAttempt {
            attempt_id: uuid::Uuid::new_v4().to_string(),
            method: draft.payment_method,
            external_reference: initiation.reference.clone(),
            status: initiation.attempt_status,
            proof: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };

        let order = Order {
            id: draft.order_id.clone(),
            user_id: draft.user_id.clone(),
            status: OrderStatus::Pending,
            payment_method: draft.payment_method,
            payment_reference: initiation.reference.clone(),
            items,
            subtotal: totals.subtotal,
            shipping_cost: totals.shipping_cost,
            tax: totals.tax,
            total: totals.total,
            shipping_info: draft.shipping_info.clone(),
            payment_attempts: vec![attempt],
            timeline: StatusTimeline::started(now),
            version: 1,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.storage.store_order(&txn, &order)?;
        self.storage.index_user_order(&txn, &order.user_id, &order.id)?;
        if let Some(reference) = &order.payment_reference {
            self.storage.store_payment_ref(&txn, reference, &order.id)?;
        }
        txn.commit()?;

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            payment_method = %order.payment_method,
            total = %order.total,
            items = order.items.len(),
            "Order created"
        );
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartSnapshotLine;
    use rust_decimal_macros::dec;
    use shared::models::Product;
    use shared::order::AttemptStatus;

    fn product(id: &str, price: rust_decimal::Decimal, stock: u32) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            price,
            stock,
            discount_percent: dec!(0),
            is_active: true,
            updated_at: 0,
        }
    }

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            full_name: "Ana Diaz".to_string(),
            address: "Av. Larco 123".to_string(),
            city: "Lima".to_string(),
            postal_code: "15074".to_string(),
            phone: "999888777".to_string(),
            notes: None,
        }
    }

    fn deferred() -> Initiation {
        Initiation {
            reference: None,
            attempt_status: AttemptStatus::Initiated,
            redirect_url: None,
        }
    }

    fn setup(products: &[Product]) -> (CommerceStorage, OrderBuilder) {
        let storage = CommerceStorage::open_in_memory().unwrap();
        for p in products {
            storage.upsert_product(p).unwrap();
        }
        let pricing = PricingConfig {
            free_shipping_threshold: dec!(100.00),
            flat_shipping_fee: dec!(8.00),
            tax_rate: dec!(0),
        };
        (storage.clone(), OrderBuilder::new(storage, pricing))
    }

    fn snapshot(storage: &CommerceStorage, lines: &[(&str, u32)]) -> CartSnapshot {
        CartSnapshot {
            user_id: "u1".to_string(),
            lines: lines
                .iter()
                .map(|(id, qty)| CartSnapshotLine {
                    product: storage.get_product(id).unwrap().unwrap(),
                    quantity: *qty,
                })
                .collect(),
        }
    }

    #[test]
    fn test_empty_snapshot_is_rejected() {
        let (_, builder) = setup(&[]);
        let empty = CartSnapshot {
            user_id: "u1".to_string(),
            lines: vec![],
        };
        assert!(matches!(
            builder.draft("u1", shipping(), PaymentMethod::Cash, &empty),
            Err(CommerceError::CartEmpty)
        ));
    }

    #[test]
    fn test_missing_shipping_fields_are_rejected() {
        let (storage, builder) = setup(&[product("a", dec!(10.00), 2)]);
        let snap = snapshot(&storage, &[("a", 1)]);
        let info = ShippingInfo {
            city: String::new(),
            ..shipping()
        };
        match builder.draft("u1", info, PaymentMethod::Cash, &snap) {
            Err(CommerceError::Validation(msg)) => assert!(msg.contains("city")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_create_order_freezes_prices_and_decrements_stock() {
        let (storage, builder) = setup(&[product("a", dec!(10.00), 2)]);
        let snap = snapshot(&storage, &[("a", 2)]);
        let draft = builder
            .draft("u1", shipping(), PaymentMethod::Cash, &snap)
            .unwrap();
        let order = builder.create_order(&draft, &deferred()).unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.version, 1);
        assert_eq!(order.subtotal, dec!(20.00));
        assert_eq!(order.shipping_cost, dec!(8.00));
        assert_eq!(order.total, dec!(28.00));
        assert_eq!(order.payment_reference, None);
        assert_eq!(order.payment_attempts.len(), 1);
        assert_eq!(storage.get_product("a").unwrap().unwrap().stock, 0);

        // Later price changes do not touch the frozen order
        let mut p = storage.get_product("a").unwrap().unwrap();
        p.price = dec!(99.00);
        storage.upsert_product(&p).unwrap();
        let stored = storage.get_order(&order.id).unwrap().unwrap();
        assert_eq!(stored.items[0].unit_price, dec!(10.00));
        assert_eq!(stored.subtotal, dec!(20.00));
        assert_eq!(storage.get_orders_for_user("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_create_order_reports_all_shortages_and_persists_nothing() {
        let (storage, builder) = setup(&[product("a", dec!(1.00), 5), product("b", dec!(1.00), 5)]);
        let snap = snapshot(&storage, &[("a", 3), ("b", 3)]);
        let draft = builder
            .draft("u1", shipping(), PaymentMethod::Cash, &snap)
            .unwrap();

        // Stock drops after the draft was priced
        for id in ["a", "b"] {
            let mut p = storage.get_product(id).unwrap().unwrap();
            p.stock = 1;
            storage.upsert_product(&p).unwrap();
        }

        match builder.create_order(&draft, &deferred()) {
            Err(CommerceError::OutOfStock(lines)) => assert_eq!(lines.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(storage.get_order(&draft.order_id).unwrap().is_none());
        assert_eq!(storage.get_product("a").unwrap().unwrap().stock, 1);
    }

    #[test]
    fn test_price_change_after_draft_aborts_creation() {
        let (storage, builder) = setup(&[product("a", dec!(10.00), 3)]);
        let snap = snapshot(&storage, &[("a", 2)]);
        let draft = builder
            .draft("u1", shipping(), PaymentMethod::Gateway, &snap)
            .unwrap();

        let mut p = storage.get_product("a").unwrap().unwrap();
        p.price = dec!(45.00);
        storage.upsert_product(&p).unwrap();

        let initiation = Initiation {
            reference: Some("pref-9".to_string()),
            attempt_status: AttemptStatus::Initiated,
            redirect_url: None,
        };
        match builder.create_order(&draft, &initiation) {
            Err(CommerceError::PriceChanged { expected, actual }) => {
                assert_eq!(expected, dec!(28.00));
                assert_eq!(actual, dec!(98.00));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(storage.get_order(&draft.order_id).unwrap().is_none());
        assert_eq!(storage.get_product("a").unwrap().unwrap().stock, 3);
        let txn = storage.begin_write().unwrap();
        assert_eq!(storage.find_order_by_reference_txn(&txn, "pref-9").unwrap(), None);
    }

    #[test]
    fn test_payment_reference_is_indexed() {
        let (storage, builder) = setup(&[product("a", dec!(5.00), 1)]);
        let snap = snapshot(&storage, &[("a", 1)]);
        let draft = builder
            .draft("u1", shipping(), PaymentMethod::Gateway, &snap)
            .unwrap();
        let initiation = Initiation {
            reference: Some("pref-123".to_string()),
            attempt_status: AttemptStatus::Initiated,
            redirect_url: Some("https://pay.example/checkout/pref-123".to_string()),
        };
        let order = builder.create_order(&draft, &initiation).unwrap();

        let txn = storage.begin_write().unwrap();
        assert_eq!(
            storage.find_order_by_reference_txn(&txn, "pref-123").unwrap(),
            Some(order.id.clone())
        );
        assert_eq!(
            order.payment_attempts[0].external_reference.as_deref(),
            Some("pref-123")
        );
    }
}
