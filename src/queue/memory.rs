//! In-process queue transport.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jiff::Timestamp;

use crate::queue::{
    JobDescriptor, QueueStats, QueueTransport, ReservedTask, TaskEnvelope, TaskOutcome,
    TaskPriority, TransportError, TransportResult,
};

#[derive(Default)]
struct QueueState {
    pending: HashMap<TaskPriority, VecDeque<TaskEnvelope>>,
    reserved: HashMap<String, (TaskEnvelope, Instant)>,
    stats: QueueStats,
}

impl QueueState {
    fn push(&mut self, envelope: TaskEnvelope) {
        self.pending
            .entry(envelope.priority)
            .or_default()
            .push_back(envelope);
    }

    fn pop(&mut self) -> Option<TaskEnvelope> {
        TaskPriority::ALL
            .iter()
            .find_map(|priority| self.pending.get_mut(priority)?.pop_front())
    }
}

/// Queue transport living in process memory.
#[derive(Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_queue<T>(
        &self,
        queue: &str,
        f: impl FnOnce(&mut QueueState) -> T,
    ) -> TransportResult<T> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|e| TransportError::Operation(e.to_string()))?;
        Ok(f(queues.entry(queue.to_string()).or_default()))
    }

    /// Drop a task from the queue and from the reservations, as if it had
    /// been lost by a crashed worker.
    pub fn discard(&self, queue: &str, task_id: &str) -> TransportResult<bool> {
        self.with_queue(queue, |state| {
            let mut found = state.reserved.remove(task_id).is_some();
            for pending in state.pending.values_mut() {
                let before = pending.len();
                pending.retain(|envelope| envelope.task_id != task_id);
                found |= pending.len() != before;
            }
            found
        })
    }
}

#[async_trait]
impl QueueTransport for MemoryQueue {
    async fn dispatch(
        &self,
        descriptor: &JobDescriptor,
        task_id: &str,
        queue: &str,
        priority: TaskPriority,
    ) -> TransportResult<String> {
        let envelope = TaskEnvelope {
            task_id: task_id.to_string(),
            queue: queue.to_string(),
            priority,
            descriptor: descriptor.clone(),
            enqueued_at: Timestamp::now(),
        };
        self.with_queue(queue, |state| state.push(envelope))?;
        Ok(task_id.to_string())
    }

    async fn enqueued_task_ids(&self, queue: &str) -> TransportResult<HashSet<String>> {
        self.with_queue(queue, |state| {
            state
                .pending
                .values()
                .flatten()
                .map(|envelope| envelope.task_id.clone())
                .collect()
        })
    }

    async fn reserved_task_ids(&self, queue: &str) -> TransportResult<HashSet<String>> {
        let now = Instant::now();
        self.with_queue(queue, |state| {
            state
                .reserved
                .iter()
                .filter(|(_, (_, deadline))| *deadline > now)
                .map(|(task_id, _)| task_id.clone())
                .collect()
        })
    }

    async fn reserve(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> TransportResult<Option<ReservedTask>> {
        let envelope = self.with_queue(queue, |state| {
            let envelope = state.pop()?;
            state.reserved.insert(
                envelope.task_id.clone(),
                (envelope.clone(), Instant::now() + visibility_timeout),
            );
            Some(envelope)
        })?;

        match envelope {
            Some(envelope) => {
                let raw = serde_json::to_string(&envelope)?;
                Ok(Some(ReservedTask { envelope, raw }))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, task: &ReservedTask, outcome: TaskOutcome) -> TransportResult<()> {
        self.with_queue(&task.envelope.queue, |state| {
            state.reserved.remove(task.task_id());
            match outcome {
                TaskOutcome::Succeeded => state.stats.succeeded += 1,
                TaskOutcome::Failed => state.stats.failed += 1,
            }
        })
    }

    async fn restore_expired(&self, queue: &str) -> TransportResult<usize> {
        let now = Instant::now();
        self.with_queue(queue, |state| {
            let expired: Vec<String> = state
                .reserved
                .iter()
                .filter(|(_, (_, deadline))| *deadline <= now)
                .map(|(task_id, _)| task_id.clone())
                .collect();

            for task_id in &expired {
                if let Some((envelope, _)) = state.reserved.remove(task_id) {
                    state.push(envelope);
                }
            }
            expired.len()
        })
    }

    async fn stats(&self, queue: &str) -> TransportResult<QueueStats> {
        self.with_queue(queue, |state| state.stats)
    }
}
