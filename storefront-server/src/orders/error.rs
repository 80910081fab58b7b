use crate::inventory::StockShortage;
use crate::storage::StorageError;
use shared::error::{AppError, ErrorCode};
use rust_decimal::Decimal;
use shared::order::{InvalidTransition, OrderStatus, PaymentMethod, StatusEvent};
use std::fmt;
use thiserror::Error;

/// What a lookup failed to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Order(String),
    Product(String),
    CartItem(String),
}

impl Resource {
    pub fn code(&self) -> ErrorCode {
        match self {
            Resource::Order(_) => ErrorCode::OrderNotFound,
            Resource::Product(_) => ErrorCode::ProductNotFound,
            Resource::CartItem(_) => ErrorCode::CartItemNotFound,
        }
    }

    fn detail(&self) -> (&'static str, &str) {
        match self {
            Resource::Order(id) => ("order_id", id),
            Resource::Product(id) | Resource::CartItem(id) => ("product_id", id),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Order(id) => write!(f, "Order {}", id),
            Resource::Product(id) => write!(f, "Product {}", id),
            Resource::CartItem(id) => write!(f, "Cart item {}", id),
        }
    }
}

/// Engine errors shared by cart, inventory, orders and payments
#[derive(Debug, Error)]
pub enum CommerceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Every line that cannot be satisfied, not just the first
    #[error("Insufficient stock for {} product(s)", .0.len())]
    OutOfStock(Vec<StockShortage>),

    #[error("Invalid quantity {quantity} (must be between 1 and {max})")]
    InvalidQuantity { quantity: i64, max: u32 },

    #[error("Cannot apply {event} to an order in status {from}")]
    InvalidTransition {
        from: OrderStatus,
        event: StatusEvent,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("{0} not found")]
    NotFound(Resource),

    #[error("Cart is empty")]
    CartEmpty,

    #[error("Order version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("No payment attempt awaiting confirmation")]
    NotAwaitingConfirmation,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Payment method {0} is not available")]
    UnsupportedMethod(PaymentMethod),

    /// Authoritative prices differ from the ones the payment was initiated with
    #[error("Prices changed: order total would be {actual}, checkout started with {expected}")]
    PriceChanged { expected: Decimal, actual: Decimal },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to store payment proof: {0}")]
    ProofStorage(String),
}

impl From<InvalidTransition> for CommerceError {
    fn from(err: InvalidTransition) -> Self {
        CommerceError::InvalidTransition {
            from: err.from,
            event: err.event,
        }
    }
}

impl From<redb::CommitError> for CommerceError {
    fn from(err: redb::CommitError) -> Self {
        CommerceError::Storage(err.into())
    }
}

pub type CommerceResult<T> = Result<T, CommerceError>;

/// Map a storage failure to an error code
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    if let StorageError::Serialization(_) = e {
        return ErrorCode::StorageCorrupted;
    }

    // redb errors carry no kind, classify by message
    let err_str = e.to_string().to_lowercase();

    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    // Database/Transaction/Table/Storage/Commit errors are treated as transient
    ErrorCode::SystemBusy
}

impl From<CommerceError> for AppError {
    fn from(err: CommerceError) -> Self {
        match err {
            CommerceError::Storage(e) => {
                let code = classify_storage_error(&e);
                tracing::error!(error = %e, error_code = %code, "Storage error occurred");
                AppError::with_message(code, e.to_string())
            }
            CommerceError::OutOfStock(shortages) => {
                let message = format!("Insufficient stock for {} product(s)", shortages.len());
                let lines = serde_json::to_value(&shortages).unwrap_or_default();
                AppError::with_message(ErrorCode::ProductOutOfStock, message)
                    .with_detail("lines", lines)
            }
            e @ CommerceError::InvalidQuantity { quantity, .. } => {
                AppError::with_message(ErrorCode::CartInvalidQuantity, e.to_string())
                    .with_detail("quantity", quantity)
            }
            CommerceError::InvalidTransition { from, event } => AppError::with_message(
                ErrorCode::OrderInvalidTransition,
                format!("Cannot apply {} to an order in status {}", event, from),
            )
            .with_detail("status", from.as_str())
            .with_detail("event", event.as_str()),
            CommerceError::Forbidden(msg) => AppError::forbidden(msg),
            CommerceError::GatewayUnavailable(msg) => {
                AppError::with_message(ErrorCode::PaymentGatewayUnavailable, msg)
            }
            CommerceError::NotFound(resource) => {
                let (key, id) = resource.detail();
                AppError::with_message(resource.code(), format!("{} not found", resource))
                    .with_detail(key, id)
            }
            CommerceError::CartEmpty => AppError::new(ErrorCode::OrderEmpty),
            e @ CommerceError::VersionConflict { expected, actual } => {
                AppError::with_message(ErrorCode::OrderVersionConflict, e.to_string())
                    .with_detail("expected_version", expected)
                    .with_detail("current_version", actual)
            }
            CommerceError::NotAwaitingConfirmation => {
                AppError::new(ErrorCode::PaymentNotAwaitingConfirmation)
            }
            CommerceError::InvalidSignature => AppError::new(ErrorCode::PaymentSignatureInvalid),
            e @ CommerceError::UnsupportedMethod(method) => {
                AppError::with_message(ErrorCode::PaymentInvalidMethod, e.to_string())
                    .with_detail("payment_method", method.as_str())
            }
            e @ CommerceError::PriceChanged { expected, actual } => {
                AppError::with_message(ErrorCode::OrderPriceChanged, e.to_string())
                    .with_detail("expected_total", expected.to_string())
                    .with_detail("total", actual.to_string())
            }
            CommerceError::Validation(msg) => AppError::validation(msg),
            CommerceError::ProofStorage(msg) => {
                tracing::error!(error = %msg, "Proof storage failed");
                AppError::internal(msg)
            }
        }
    }
}
