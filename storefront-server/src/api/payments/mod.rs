//! Payment Gateway Webhook
//!
//! Unauthenticated; the HMAC signature over the raw body is the credential.

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/payments/webhook", post(handler::webhook))
}
