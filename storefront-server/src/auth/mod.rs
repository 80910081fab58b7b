//! Authentication
//!
//! - [`JwtService`] - token validation
//! - [`CurrentUser`] - authenticated user (axum extractor)
//! - [`AdminUser`] - extractor that requires the admin role

pub mod extractor;
pub mod jwt;

pub use extractor::AdminUser;
pub use jwt::{ADMIN_ROLE, Claims, CurrentUser, JwtConfig, JwtError, JwtService};
