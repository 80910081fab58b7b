//! Admin Order Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::order::{ConfirmPaymentRequest, Order, OrderStatus, StatusUpdateRequest};

use crate::auth::AdminUser;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult, ok};

/// Move an order to the requested status
///
/// `processing` goes through payment confirmation so the per-method checks
/// apply (gateway orders are confirmed by the gateway only).
pub async fn update_status(
    State(state): State<ServerState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = if payload.status == OrderStatus::Processing {
        state
            .payments
            .confirm_payment(&admin, &id, payload.expected_version)?
    } else {
        state.lifecycle.admin_transition(
            &admin,
            &id,
            payload.status,
            payload.expected_version,
            payload.reason,
        )?
    };
    Ok(ok(order))
}

/// Confirm a manual-proof or cash / bank transfer payment
pub async fn confirm_payment(
    State(state): State<ServerState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    payload: Option<Json<ConfirmPaymentRequest>>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let Json(request) = payload.unwrap_or_default();
    let order = state
        .payments
        .confirm_payment(&admin, &id, request.expected_version)?;
    Ok(ok(order))
}
