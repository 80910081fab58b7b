//! Health check
//!
//! | Path | Method | Description | Auth |
//! |------|------|------|------|
//! | /health | GET | Liveness plus a database read | none |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::{ApiResponse, ok};

/// Health routes (public)
pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// ok | degraded
    status: &'static str,
    version: &'static str,
    environment: String,
    /// Whether the database answered a read
    database: bool,
    /// Enabled payment methods
    payment_methods: Vec<String>,
}

async fn health(State(state): State<ServerState>) -> Json<ApiResponse<HealthResponse>> {
    let database = match state.storage.get_product("__health_check__") {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(error = %e, "Health check: database read failed");
            false
        }
    };

    ok(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        database,
        payment_methods: state
            .checkout
            .strategies()
            .methods()
            .iter()
            .map(|m| m.to_string())
            .collect(),
    })
}
