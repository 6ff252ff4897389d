//! Task consumption loops feeding delivered tasks to the [`JobRunner`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::settings::QueueConfig;
use crate::jobs::error::JobResult;
use crate::jobs::runner::{JobRunner, RunOutcome};
use crate::jobs::scheduler::GROUP_SYNC_TASK;
use crate::queue::{QueueTransport, ReservedTask, TaskOutcome};

/// How often the first worker puts expired reservations back on the queue.
const RESTORE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct WorkerPool {
    runner: Arc<JobRunner>,
    queue: Arc<dyn QueueTransport>,
    queue_config: QueueConfig,
    concurrency: usize,
    idle_poll: Duration,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(state: &crate::AppState, concurrency: usize) -> Self {
        Self {
            runner: Arc::new(state.runner()),
            queue: state.queue.clone(),
            queue_config: state.settings.queue.clone(),
            concurrency: concurrency.max(1),
            idle_poll: state.settings.runner.idle_poll(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops every worker after its current task.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the workers until the shutdown token is cancelled.
    pub async fn run(&self) {
        let mut workers = JoinSet::new();
        for worker_id in 0..self.concurrency {
            let pool = self.clone();
            workers.spawn(async move { pool.work(worker_id).await });
        }

        tracing::info!(
            queue = %self.queue_config.name,
            concurrency = self.concurrency,
            "Worker pool started"
        );

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }

        tracing::info!(queue = %self.queue_config.name, "Worker pool stopped");
    }

    async fn work(&self, worker_id: usize) {
        let mut last_restore: Option<Instant> = None;

        while !self.shutdown.is_cancelled() {
            if worker_id == 0 && last_restore.is_none_or(|at| at.elapsed() >= RESTORE_INTERVAL) {
                self.restore_expired().await;
                last_restore = Some(Instant::now());
            }

            match self.process_next().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "Failed to consume task");
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.idle_poll) => {}
            }
        }
    }

    async fn restore_expired(&self) {
        match self.queue.restore_expired(&self.queue_config.name).await {
            Ok(0) => {}
            Ok(restored) => {
                tracing::warn!(queue = %self.queue_config.name, restored, "Restored expired task reservations");
            }
            Err(e) => {
                tracing::error!(queue = %self.queue_config.name, error = %e, "Failed to restore expired reservations");
            }
        }
    }

    /// Reserves, runs and acknowledges one task. Returns `false` when the
    /// queue was empty.
    pub async fn process_next(&self) -> JobResult<bool> {
        let Some(task) = self
            .queue
            .reserve(&self.queue_config.name, self.queue_config.visibility_timeout())
            .await?
        else {
            return Ok(false);
        };

        let outcome = self.handle(&task).await;
        self.queue.ack(&task, outcome).await?;
        Ok(true)
    }

    async fn handle(&self, task: &ReservedTask) -> TaskOutcome {
        let envelope = &task.envelope;
        if envelope.descriptor.task_name != GROUP_SYNC_TASK {
            tracing::error!(
                task_id = %envelope.task_id,
                task_name = %envelope.descriptor.task_name,
                "Unknown task name"
            );
            return TaskOutcome::Failed;
        }

        match self.runner.execute(envelope, self.shutdown.child_token()).await {
            Ok(outcome) => {
                tracing::debug!(task_id = %envelope.task_id, outcome = ?outcome, "Task finished");
                if matches!(outcome, RunOutcome::TimedOut) {
                    tracing::info!(task_id = %envelope.task_id, "Task terminated early");
                }
                TaskOutcome::Succeeded
            }
            Err(e) => {
                tracing::error!(task_id = %envelope.task_id, error = %e, "Task failed");
                TaskOutcome::Failed
            }
        }
    }
}
