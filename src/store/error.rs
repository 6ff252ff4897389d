//! Fence store error types.

use thiserror::Error;

/// Errors that can occur during fence store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store operation failed: {0}")]
    Operation(String),

    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock not owned: {0}")]
    LockNotOwned(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        if error.is_connection_dropped() || error.is_connection_refusal() || error.is_timeout() {
            StoreError::Connection(error.to_string())
        } else {
            StoreError::Operation(error.to_string())
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
