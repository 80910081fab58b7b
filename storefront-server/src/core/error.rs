use thiserror::Error;

use crate::storage::StorageError;

/// Startup and serve errors (never crosses the HTTP boundary)
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result alias
pub type Result<T> = std::result::Result<T, ServerError>;
