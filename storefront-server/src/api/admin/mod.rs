//! Admin Order API
//!
//! All routes require the admin role ([`crate::auth::AdminUser`]).

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/admin/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/{id}/status", post(handler::update_status))
        .route("/{id}/confirm-payment", post(handler::confirm_payment))
}
