use thiserror::Error;

use crate::jobs::types::SourceType;
use crate::queue::TransportError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Fence not found: {fence}")]
    FenceNotFound { fence: String },

    #[error("Timed out after {waited_secs}s waiting for fence to become ready: {fence}")]
    FenceWaitTimedOut { fence: String, waited_secs: u64 },

    #[error("Fence payload invalid or not found: {fence}")]
    PayloadInvalid { fence: String },

    #[error("Fence payload does not match the current schema: {fence}: {source}")]
    FenceSchema {
        fence: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Sync entity not found: {0}")]
    EntityNotFound(i64),

    #[error("No group sync policy registered for source: {0}")]
    NoSyncPolicy(SourceType),

    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type JobResult<T> = Result<T, JobError>;
