//! Order API Module
//!
//! Customer view of their own orders. Admins can read any order.

mod handler;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::core::ServerState;
use crate::payments::manual::MAX_PROOF_SIZE;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/cancel", post(handler::cancel))
        .route(
            "/{id}/payment-proof",
            post(handler::upload_proof).layer(DefaultBodyLimit::max(MAX_PROOF_SIZE + 64 * 1024)),
        )
}
