//! Checkout API Handler

use axum::{Json, extract::State};
use shared::order::{CheckoutRequest, CheckoutResponse};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult, ok_with_message};

/// Place an order from the current cart
///
/// Totals are always computed server-side; the request carries none.
pub async fn checkout(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutResponse>>> {
    let response = state.checkout.checkout(&user, payload).await?;
    Ok(ok_with_message("Order created", response))
}
