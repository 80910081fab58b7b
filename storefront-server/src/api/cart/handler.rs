//! Cart API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::models::{AddToCartRequest, CartView, UpdateCartItemRequest};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult, ok};

/// Current cart with totals
pub async fn get_cart(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    Ok(ok(state.cart.view(&user.id)?))
}

/// Add a product (merges with an existing line)
pub async fn add_item(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let cart = state
        .cart
        .add(&user.id, &payload.product_id, payload.quantity)?;
    Ok(ok(cart))
}

/// Set the quantity of a line
pub async fn update_item(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(product_id): Path<String>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let cart = state.cart.update(&user.id, &product_id, payload.quantity)?;
    Ok(ok(cart))
}

pub async fn remove_item(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(product_id): Path<String>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    Ok(ok(state.cart.remove(&user.id, &product_id)?))
}

pub async fn clear_cart(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    Ok(ok(state.cart.clear(&user.id)?))
}
