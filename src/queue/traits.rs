//! QueueTransport trait definition.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::queue::{
    JobDescriptor, QueueStats, ReservedTask, TaskOutcome, TaskPriority, TransportResult,
};

/// At-least-once task delivery between the scheduler and the workers.
///
/// The two snapshot methods are best effort: a task moving from the queue to
/// a worker can briefly appear in neither.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Enqueue a task under a caller-chosen id and return the id the
    /// transport accepted it under.
    async fn dispatch(
        &self,
        descriptor: &JobDescriptor,
        task_id: &str,
        queue: &str,
        priority: TaskPriority,
    ) -> TransportResult<String>;

    /// Ids of tasks waiting in the queue.
    async fn enqueued_task_ids(&self, queue: &str) -> TransportResult<HashSet<String>>;

    /// Ids of tasks taken by a worker whose reservation has not expired.
    async fn reserved_task_ids(&self, queue: &str) -> TransportResult<HashSet<String>>;

    /// Take the next task, highest priority first. The task stays reserved
    /// until acknowledged or until `visibility_timeout` passes.
    async fn reserve(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> TransportResult<Option<ReservedTask>>;

    /// Acknowledge a reserved task and count its outcome.
    async fn ack(&self, task: &ReservedTask, outcome: TaskOutcome) -> TransportResult<()>;

    /// Put tasks whose reservation expired back on the queue.
    async fn restore_expired(&self, queue: &str) -> TransportResult<usize>;

    async fn stats(&self, queue: &str) -> TransportResult<QueueStats>;
}
