//! Order status transitions
//!
//! Every status change goes through [`OrderLifecycle::apply_in_txn`]:
//! authorization, optimistic version check, the transition table, timeline
//! stamp, version bump and (on cancel) restock, all inside the caller's write
//! transaction.

use std::sync::Arc;

use redb::WriteTransaction;
use shared::order::{AttemptStatus, Order, OrderStatus, PaymentMethod, StatusEvent};

use super::error::{CommerceError, CommerceResult, Resource};
use crate::auth::CurrentUser;
use crate::inventory::InventoryGuard;
use crate::notify::{Notifier, OrderNotification};
use crate::storage::CommerceStorage;

/// Who is driving a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User { id: String, is_admin: bool },
    /// Payment gateway reconciliation
    System,
}

impl From<&CurrentUser> for Actor {
    fn from(user: &CurrentUser) -> Self {
        Actor::User {
            id: user.id.clone(),
            is_admin: user.is_admin(),
        }
    }
}

impl Actor {
    fn is_admin(&self) -> bool {
        matches!(self, Actor::User { is_admin: true, .. })
    }

    fn owns(&self, order: &Order) -> bool {
        matches!(self, Actor::User { id, .. } if *id == order.user_id)
    }

    fn label(&self) -> &str {
        match self {
            Actor::User { id, .. } => id,
            Actor::System => "system",
        }
    }
}

/// Who may fire which event
///
/// - `Cancel`: owner or admin
/// - `PaymentConfirmed`: system; admin too unless the order is paid through the gateway
/// - `Ship`, `Deliver`: admin
pub fn authorize(actor: &Actor, order: &Order, event: StatusEvent) -> CommerceResult<()> {
    let allowed = match event {
        StatusEvent::Cancel => actor.is_admin() || actor.owns(order),
        StatusEvent::PaymentConfirmed => {
            *actor == Actor::System
                || (actor.is_admin() && order.payment_method != PaymentMethod::Gateway)
        }
        StatusEvent::Ship | StatusEvent::Deliver => actor.is_admin(),
    };

    if !allowed {
        tracing::warn!(order_id = %order.id, actor = %actor.label(), event = %event, "Transition not permitted");
        return Err(CommerceError::Forbidden(format!(
            "Not allowed to {} order {}",
            event, order.id
        )));
    }
    Ok(())
}

/// Stale-write guard
pub fn check_version(order: &Order, expected_version: Option<u64>) -> CommerceResult<()> {
    match expected_version {
        Some(expected) if expected != order.version => Err(CommerceError::VersionConflict {
            expected,
            actual: order.version,
        }),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct OrderLifecycle {
    storage: CommerceStorage,
    inventory: InventoryGuard,
    notifier: Arc<dyn Notifier>,
    restock_on_cancel: bool,
}

impl std::fmt::Debug for OrderLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLifecycle")
            .field("restock_on_cancel", &self.restock_on_cancel)
            .finish_non_exhaustive()
    }
}

impl OrderLifecycle {
    pub fn new(
        storage: CommerceStorage,
        notifier: Arc<dyn Notifier>,
        restock_on_cancel: bool,
    ) -> Self {
        Self {
            inventory: InventoryGuard::new(storage.clone()),
            storage,
            notifier,
            restock_on_cancel,
        }
    }

    pub fn storage(&self) -> &CommerceStorage {
        &self.storage
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Apply `event` to `order` inside `txn`; returns the previous status
    ///
    /// The caller persists `order` and commits.
    pub fn apply_in_txn(
        &self,
        txn: &WriteTransaction,
        order: &mut Order,
        actor: &Actor,
        event: StatusEvent,
        expected_version: Option<u64>,
    ) -> CommerceResult<OrderStatus> {
        authorize(actor, order, event)?;
        check_version(order, expected_version)?;

        let from = order.status;
        let to = from.apply(event)?;
        let now = shared::util::now_millis();

        match event {
            StatusEvent::PaymentConfirmed => {
                if let Some(attempt) = order.open_attempt_mut() {
                    attempt.status = AttemptStatus::Confirmed;
                    attempt.updated_at = now;
                }
            }
            StatusEvent::Cancel => {
                for attempt in order.payment_attempts.iter_mut().filter(|a| a.status.is_open()) {
                    attempt.status = AttemptStatus::Failed;
                    attempt.failure_reason = Some("order cancelled".to_string());
                    attempt.updated_at = now;
                }
                if self.restock_on_cancel {
                    self.inventory.release_in_txn(txn, &order.items)?;
                }
            }
            StatusEvent::Ship | StatusEvent::Deliver => {}
        }

        order.status = to;
        order.timeline.stamp(to, now);
        order.version += 1;
        order.updated_at = now;

        tracing::info!(
            order_id = %order.id,
            actor = %actor.label(),
            from = %from,
            to = %to,
            version = order.version,
            "Order status changed"
        );
        Ok(from)
    }

    /// Load, transition, persist and notify in one write transaction
    pub fn transition(
        &self,
        actor: &Actor,
        order_id: &str,
        event: StatusEvent,
        expected_version: Option<u64>,
        reason: Option<String>,
    ) -> CommerceResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| CommerceError::NotFound(Resource::Order(order_id.to_string())))?;

        let from = self.apply_in_txn(&txn, &mut order, actor, event, expected_version)?;
        if event == StatusEvent::Cancel {
            order.cancel_reason = reason;
        }

        self.storage.store_order(&txn, &order)?;
        txn.commit()?;

        self.notifier
            .notify(OrderNotification::status_changed(&order, from));
        Ok(order)
    }

    /// Customer (or admin) cancellation
    pub fn cancel(
        &self,
        user: &CurrentUser,
        order_id: &str,
        reason: Option<String>,
        expected_version: Option<u64>,
    ) -> CommerceResult<Order> {
        self.transition(
            &Actor::from(user),
            order_id,
            StatusEvent::Cancel,
            expected_version,
            reason,
        )
    }

    /// Admin ships, delivers or cancels an order
    ///
    /// `processing` is reached only by confirming the payment, see
    /// `PaymentCoordinator::confirm_payment`.
    pub fn admin_transition(
        &self,
        admin: &CurrentUser,
        order_id: &str,
        target: OrderStatus,
        expected_version: Option<u64>,
        reason: Option<String>,
    ) -> CommerceResult<Order> {
        if !admin.is_admin() {
            return Err(CommerceError::Forbidden(
                "Administrator role is required".to_string(),
            ));
        }
        let event = match StatusEvent::for_target(target) {
            Some(StatusEvent::PaymentConfirmed) => {
                return Err(CommerceError::Validation(
                    "An order becomes processing by confirming its payment".to_string(),
                ));
            }
            Some(event) => event,
            None => {
                return Err(CommerceError::Validation(format!(
                    "{} is not a valid target status",
                    target
                )));
            }
        };
        self.transition(&Actor::from(admin), order_id, event, expected_version, reason)
    }

    /// Orders of one user, newest first
    pub fn list_for_user(&self, user_id: &str) -> CommerceResult<Vec<Order>> {
        Ok(self.storage.get_orders_for_user(user_id)?)
    }

    /// Order visible to `user` (owner or admin)
    pub fn get_for_user(&self, user: &CurrentUser, order_id: &str) -> CommerceResult<Order> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or_else(|| CommerceError::NotFound(Resource::Order(order_id.to_string())))?;
        if order.user_id != user.id && !user.is_admin() {
            // Do not reveal other users' order ids
            return Err(CommerceError::NotFound(Resource::Order(order_id.to_string())));
        }
        Ok(order)
    }
}
