//! Queue transport: at-least-once delivery of dispatched jobs to workers.
//!
//! The coordination core only needs dispatch plus two best-effort snapshots
//! (enqueued and reserved task ids); the worker pool additionally reserves,
//! acknowledges and restores tasks.

mod error;
mod memory;
mod redis;
mod traits;
mod types;

use std::sync::Arc;

pub use error::{TransportError, TransportResult};
pub use memory::MemoryQueue;
pub use self::redis::RedisQueue;
pub use traits::QueueTransport;
pub use types::{
    JobDescriptor, QueueStats, ReservedTask, TaskEnvelope, TaskOutcome, TaskPriority,
};

pub use crate::config::settings::{QueueBackend, QueueConfig};

/// Build the configured queue transport.
pub async fn connect_queue(config: &QueueConfig) -> TransportResult<Arc<dyn QueueTransport>> {
    let queue: Arc<dyn QueueTransport> = match config.backend {
        QueueBackend::Memory => Arc::new(MemoryQueue::new()),
        QueueBackend::Redis => Arc::new(RedisQueue::new(&config.redis).await?),
    };

    tracing::debug!(backend = ?config.backend, queue = %config.name, "Queue transport connected");
    Ok(queue)
}
