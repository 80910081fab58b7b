//! Orders
//!
//! - **builder**: cart snapshot → priced draft → persisted order
//! - **lifecycle**: status transitions with authorization and versioning
//! - **money**: line totals, shipping and tax
//! - **error**: engine error type shared with cart, inventory and payments
//!
//! # Status flow
//!
//! ```text
//! pending ──PaymentConfirmed──► processing ──Ship──► shipped ──Deliver──► delivered
//!    │                              │
//!    └────────Cancel───────────────┴──► cancelled
//! ```

pub mod builder;
pub mod error;
pub mod lifecycle;
pub mod money;

pub use builder::{OrderBuilder, OrderDraft};
pub use error::{CommerceError, CommerceResult, Resource};
pub use lifecycle::{Actor, OrderLifecycle};
