//! Gateway webhook payload and signature check

use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::orders::{CommerceError, CommerceResult};

/// Header carrying the hex HMAC-SHA256 of the raw body
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPaymentStatus {
    Approved,
    Rejected,
    Cancelled,
    Pending,
    InProcess,
}

impl GatewayPaymentStatus {
    /// Final negative outcome for the attempt
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            GatewayPaymentStatus::Rejected | GatewayPaymentStatus::Cancelled
        )
    }
}

/// Payment notification posted by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNotification {
    /// Unique per notification; redelivery reuses it
    #[serde(alias = "id")]
    pub event_id: String,
    pub preference_id: String,
    pub status: GatewayPaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
}

impl GatewayNotification {
    pub fn parse(body: &[u8]) -> CommerceResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| CommerceError::Validation(format!("Invalid webhook payload: {}", e)))
    }
}

/// Hex HMAC-SHA256 of `body`
pub fn sign(body: &[u8], secret: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hex::encode(hmac::sign(&key, body).as_ref())
}

/// Verify the signature header against the raw body (constant-time)
///
/// Accepts `<hex>` or `sha256=<hex>`.
pub fn verify_signature(body: &[u8], signature: Option<&str>, secret: &str) -> CommerceResult<()> {
    let signature = signature.ok_or(CommerceError::InvalidSignature)?.trim();
    let hex_sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    let sig_bytes = hex::decode(hex_sig).map_err(|_| CommerceError::InvalidSignature)?;

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::verify(&key, body, &sig_bytes).map_err(|_| CommerceError::InvalidSignature)
}
