//! Order aggregate and checkout wire types

use super::status::{OrderStatus, StatusTimeline};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the customer pays
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Hosted checkout with redirect, confirmed by webhook
    Gateway,
    /// Wallet / QR transfer with an uploaded proof, confirmed by an admin
    ManualProof,
    /// Cash on delivery
    Cash,
    BankTransfer,
}

impl PaymentMethod {
    /// Cash and bank transfer: no external call at checkout
    pub fn is_deferred(&self) -> bool {
        matches!(self, PaymentMethod::Cash | PaymentMethod::BankTransfer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Gateway => "gateway",
            PaymentMethod::ManualProof => "manual_proof",
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment attempt status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Initiated,
    AwaitingConfirmation,
    Confirmed,
    Failed,
}

impl AttemptStatus {
    /// Still able to become `confirmed`
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            AttemptStatus::Initiated | AttemptStatus::AwaitingConfirmation
        )
    }
}

/// Metadata of an uploaded proof-of-payment image
///
/// The image bytes are handed to the external image store; the order keeps
/// enough to identify and audit the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofUpload {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the image bytes
    pub sha256: String,
    pub uploaded_at: i64,
}

/// One try at paying an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub attempt_id: String,
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<ProofUpload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Delivery address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ShippingInfo {
    /// Names of required fields that are blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("address", &self.address),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("phone", &self.phone),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

/// Frozen order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// Order aggregate: header, frozen lines and payment attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    /// Gateway preference id or manual-proof token; `None` for deferred
    pub payment_reference: Option<String>,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub shipping_info: ShippingInfo,
    #[serde(default)]
    pub payment_attempts: Vec<PaymentAttempt>,
    pub timeline: StatusTimeline,
    /// Incremented on every mutation; optimistic concurrency token
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Most recent attempt that can still be confirmed
    pub fn open_attempt_mut(&mut self) -> Option<&mut PaymentAttempt> {
        self.payment_attempts
            .iter_mut()
            .rev()
            .find(|a| a.status.is_open())
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Checkout payload
///
/// Carries no prices or totals; the server computes all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_info: ShippingInfo,
    pub payment_method: PaymentMethod,
}

/// Checkout result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order: Order,
    /// Hosted payment page for the gateway path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Customer cancellation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Admin status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Admin payment confirmation (manual proof / deferred)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    #[serde(default)]
    pub expected_version: Option<u64>,
}
