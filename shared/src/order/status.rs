//! Order status state machine
//!
//! The allowed edges live in one table ([`TRANSITIONS`]); every status change
//! in the system goes through [`OrderStatus::apply`].
//!
//! ```text
//! pending ──PaymentConfirmed──▶ processing ──Ship──▶ shipped ──Deliver──▶ delivered
//!    │                              │
//!    └────────Cancel────────┬───────┘
//!                           ▼
//!                       cancelled
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// Event that drives a status change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusEvent {
    /// Payment received (gateway webhook or admin confirmation)
    PaymentConfirmed,
    Ship,
    Deliver,
    Cancel,
}

/// (current, event) → next
pub const TRANSITIONS: &[(OrderStatus, StatusEvent, OrderStatus)] = &[
    (
        OrderStatus::Pending,
        StatusEvent::PaymentConfirmed,
        OrderStatus::Processing,
    ),
    (OrderStatus::Pending, StatusEvent::Cancel, OrderStatus::Cancelled),
    (OrderStatus::Processing, StatusEvent::Ship, OrderStatus::Shipped),
    (
        OrderStatus::Processing,
        StatusEvent::Cancel,
        OrderStatus::Cancelled,
    ),
    (OrderStatus::Shipped, StatusEvent::Deliver, OrderStatus::Delivered),
];

/// Rejected transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub event: StatusEvent,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot apply {} to an order in status {}",
            self.event, self.from
        )
    }
}

impl std::error::Error for InvalidTransition {}

impl OrderStatus {
    /// `delivered` and `cancelled` accept no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Look up the next status for `event`
    pub fn apply(self, event: StatusEvent) -> Result<OrderStatus, InvalidTransition> {
        TRANSITIONS
            .iter()
            .find(|(from, ev, _)| *from == self && *ev == event)
            .map(|(_, _, to)| *to)
            .ok_or(InvalidTransition { from: self, event })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StatusEvent {
    /// Event an admin means when asking for `target`
    ///
    /// `pending` is never a target; it is only an initial state.
    pub fn for_target(target: OrderStatus) -> Option<StatusEvent> {
        match target {
            OrderStatus::Pending => None,
            OrderStatus::Processing => Some(StatusEvent::PaymentConfirmed),
            OrderStatus::Shipped => Some(StatusEvent::Ship),
            OrderStatus::Delivered => Some(StatusEvent::Deliver),
            OrderStatus::Cancelled => Some(StatusEvent::Cancel),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusEvent::PaymentConfirmed => "payment_confirmed",
            StatusEvent::Ship => "ship",
            StatusEvent::Deliver => "deliver",
            StatusEvent::Cancel => "cancel",
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-state timestamps for the customer-facing timeline (millis)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimeline {
    pub pending_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
}

impl StatusTimeline {
    pub fn started(at: i64) -> Self {
        Self {
            pending_at: at,
            ..Default::default()
        }
    }

    /// Record entry into `status`
    pub fn stamp(&mut self, status: OrderStatus, at: i64) {
        match status {
            OrderStatus::Pending => self.pending_at = at,
            OrderStatus::Processing => self.processing_at = Some(at),
            OrderStatus::Shipped => self.shipped_at = Some(at),
            OrderStatus::Delivered => self.delivered_at = Some(at),
            OrderStatus::Cancelled => self.cancelled_at = Some(at),
        }
    }

    pub fn at(&self, status: OrderStatus) -> Option<i64> {
        match status {
            OrderStatus::Pending => Some(self.pending_at),
            OrderStatus::Processing => self.processing_at,
            OrderStatus::Shipped => self.shipped_at,
            OrderStatus::Delivered => self.delivered_at,
            OrderStatus::Cancelled => self.cancelled_at,
        }
    }
}
