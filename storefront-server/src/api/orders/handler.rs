//! Order API Handlers

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use shared::order::{CancelOrderRequest, Order};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppError, AppResult, ok, ok_with_message};

/// Orders of the current user, newest first
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    Ok(ok(state.lifecycle.list_for_user(&user.id)?))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(ok(state.lifecycle.get_for_user(&user, &id)?))
}

/// Cancel a pending or processing order
pub async fn cancel(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    payload: Option<Json<CancelOrderRequest>>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let Json(request) = payload.unwrap_or_default();
    let order = state
        .lifecycle
        .cancel(&user, &id, request.reason, request.expected_version)?;
    Ok(ok_with_message("Order cancelled", order))
}

/// Upload a proof-of-payment image (multipart field `file`)
pub async fn upload_proof(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<Order>>> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart request: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::validation("No filename provided in file field"))?;
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Multipart error: {}", e)))?;
        upload = Some((file_name, content_type, data));
        break;
    }

    let (file_name, content_type, data) = upload.ok_or_else(|| {
        AppError::validation("No 'file' field found. Field name must be 'file'")
    })?;

    let order = state
        .payments
        .upload_proof(&user, &id, &file_name, content_type.as_deref(), &data)
        .await?;
    Ok(ok_with_message("Payment proof received", order))
}
