//! Storefront Server - order and payment reconciliation engine
//!
//! # Overview
//!
//! - **Cart** (`cart`): per-user persisted cart, re-priced on every change
//! - **Inventory** (`inventory`): stock checked and decremented inside the order transaction
//! - **Orders** (`orders`): order creation, status machine, totals
//! - **Payments** (`payments`): gateway redirect, manual proof, cash on delivery, reconciliation
//! - **Auth** (`auth`): JWT authentication
//! - **HTTP API** (`api`): REST endpoints
//!
//! # Layout
//!
//! ```text
//! storefront-server/src/
//! ├── core/          # config, state, errors, server
//! ├── auth/          # JWT auth
//! ├── api/           # HTTP routes and handlers
//! ├── cart/          # cart
//! ├── inventory/     # stock checks and decrements
//! ├── orders/        # order creation and status
//! ├── payments/      # payment strategies and reconciliation
//! ├── notify/        # order notifications
//! ├── storage.rs     # redb storage layer
//! └── utils/         # logging, response envelope
//! ```

pub mod api;
pub mod auth;
pub mod cart;
pub mod core;
pub mod inventory;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod storage;
pub mod utils;

// Re-export public types
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use orders::{CommerceError, CommerceResult};
pub use storage::CommerceStorage;
pub use utils::{AppError, AppResult};

// Re-export unified error types from shared
pub use utils::{ApiResponse, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// Prepare the process: load .env and start logging
///
/// Log level and directory are read before the config so config errors get logged.
pub fn setup_environment() {
    // .env is optional
    let _ = dotenv::dotenv();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty());
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
}

pub fn print_banner() {
    println!(
        r#"
   _____ __                  ____                 __
  / ___// /_____  ________  / __/________  ____  / /_
  \__ \/ __/ __ \/ ___/ _ \/ /_/ ___/ __ \/ __ \/ __/
 ___/ / /_/ /_/ / /  /  __/ __/ /  / /_/ / / / / /_
/____/\__/\____/_/   \___/_/ /_/   \____/_/ /_/\__/
    "#
    );
}
