//! Webhook Handler

use axum::{Json, body::Bytes, extract::State};
use http::HeaderMap;

use crate::core::ServerState;
use crate::payments::coordinator::WebhookOutcome;
use crate::payments::webhook::SIGNATURE_HEADER;
use crate::utils::{ApiResponse, AppResult, ok};

/// Gateway payment notification
///
/// The body is read raw so the signature is checked over the exact bytes.
pub async fn webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<WebhookOutcome>>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let outcome = state.payments.handle_gateway_webhook(&body, signature)?;
    Ok(ok(outcome))
}
