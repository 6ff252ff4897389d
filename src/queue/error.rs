//! Queue transport error types.

use thiserror::Error;

/// Errors raised by a queue transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Queue operation failed: {0}")]
    Operation(String),

    #[error("Queue connection failed: {0}")]
    Connection(String),

    #[error("Task envelope serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for TransportError {
    fn from(error: redis::RedisError) -> Self {
        if error.is_connection_dropped() || error.is_connection_refusal() || error.is_timeout() {
            TransportError::Connection(error.to_string())
        } else {
            TransportError::Operation(error.to_string())
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
