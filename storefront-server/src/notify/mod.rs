//! Order notifications
//!
//! Published after a transaction commits. Delivery (email, push) is owned by
//! whoever subscribes; publishing never fails the operation that triggered it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::order::{Order, OrderStatus, PaymentMethod};
use tokio::sync::broadcast;

/// Broadcast channel capacity
const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderNotification {
    Created {
        order_id: String,
        user_id: String,
        payment_method: PaymentMethod,
        total: Decimal,
    },
    StatusChanged {
        order_id: String,
        user_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    PaymentFailed {
        order_id: String,
        user_id: String,
        reason: String,
    },
    ProofSubmitted {
        order_id: String,
        user_id: String,
    },
}

impl OrderNotification {
    pub fn created(order: &Order) -> Self {
        Self::Created {
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            payment_method: order.payment_method,
            total: order.total,
        }
    }

    pub fn status_changed(order: &Order, from: OrderStatus) -> Self {
        Self::StatusChanged {
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            from,
            to: order.status,
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            Self::Created { order_id, .. }
            | Self::StatusChanged { order_id, .. }
            | Self::PaymentFailed { order_id, .. }
            | Self::ProofSubmitted { order_id, .. } => order_id,
        }
    }
}

/// Sink for order notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: OrderNotification);
}

/// Publishes on a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<OrderNotification>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderNotification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: OrderNotification) {
        tracing::info!(order_id = %notification.order_id(), notification = ?notification, "Order notification");
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification dropped: no active receivers");
        }
    }
}
