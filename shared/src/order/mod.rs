//! Order Module
//!
//! - `status`: lifecycle states, transition table and timeline
//! - `types`: the order aggregate, payment attempts and checkout payloads

pub mod status;
pub mod types;

// Re-exports
pub use status::{InvalidTransition, OrderStatus, StatusEvent, StatusTimeline, TRANSITIONS};
pub use types::*;
