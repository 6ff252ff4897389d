//! Executes one delivered group sync task under the fence protocol.

use std::sync::Arc;

use futures::TryStreamExt;
use jiff::Timestamp;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::settings::RunnerConfig;
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::fence::{FenceRecord, SyncFence};
use crate::jobs::keys::WorkKey;
use crate::jobs::registry::SourceRegistry;
use crate::jobs::types::{ExternalGroup, JobContext, SourceType};
use crate::queue::TaskEnvelope;
use crate::services::{
    BackgroundErrorSink, EntityCatalog, GROUP_SYNC_JOB, GroupSink, SyncStatus, SyncStatusReporter,
};
use crate::store::{FenceStore, StoreLock};

/// How an execution attempt ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The body finished; `items` groups were flushed to the sink.
    Succeeded { items: usize },
    /// The soft time limit or a shutdown cut the body short.
    TimedOut,
    /// Another runner holds the execution lock and owns the fence.
    LockContended,
    /// The fence belongs to a newer task than the one delivered.
    Superseded,
}

/// One observation of the fence while waiting for the scheduler to finish
/// writing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenceWaitState {
    Waiting,
    Ready(FenceRecord),
    TimedOut,
}

pub struct JobRunner {
    store: Arc<dyn FenceStore>,
    registry: Arc<SourceRegistry>,
    catalog: Arc<dyn EntityCatalog>,
    status: Arc<dyn SyncStatusReporter>,
    sink: Arc<dyn GroupSink>,
    errors: Arc<dyn BackgroundErrorSink>,
    config: RunnerConfig,
}

impl JobRunner {
    pub fn new(state: &crate::AppState) -> Self {
        Self {
            store: state.store.clone(),
            registry: state.registry.clone(),
            catalog: state.catalog.clone(),
            status: state.status.clone(),
            sink: state.sink.clone(),
            errors: state.errors.clone(),
            config: state.settings.runner.clone(),
        }
    }

    pub async fn execute(
        &self,
        envelope: &TaskEnvelope,
        cancel: CancellationToken,
    ) -> JobResult<RunOutcome> {
        let descriptor = &envelope.descriptor;
        let key = WorkKey::new(descriptor.tenant_id.clone(), descriptor.entity_id);
        let fence = SyncFence::new(self.store.clone(), key);

        tracing::info!(
            entity_id = descriptor.entity_id,
            task_id = %envelope.task_id,
            "Group sync task starting"
        );

        let mut record = match self.wait_for_fence(&fence).await {
            Ok(record) => record,
            Err(e) => {
                self.fail_invariant(&fence, &envelope.task_id, &e).await;
                return Err(e);
            }
        };

        if record.task_id.as_deref() != Some(envelope.task_id.as_str()) {
            tracing::warn!(
                fence = %fence.fence_key(),
                task_id = %envelope.task_id,
                fence_task_id = ?record.task_id,
                "Fence belongs to another task, skipping stale delivery"
            );
            return Ok(RunOutcome::Superseded);
        }

        let lock = StoreLock::new(
            self.store.clone(),
            fence.key().lock_key(),
            self.config.lock_ttl(),
        );
        if !lock.acquire(None).await? {
            tracing::info!(
                entity_id = fence.key().entity_id,
                lock = %lock.name(),
                "Execution lock held by another runner, exiting"
            );
            return Ok(RunOutcome::LockContended);
        }

        let result = self.run_locked(&fence, &lock, &mut record, envelope, cancel).await;

        if let Err(e) = fence.clear().await {
            tracing::error!(fence = %fence.fence_key(), error = %e, "Failed to clear fence");
        }
        lock.release_if_owned().await;

        result
    }

    /// Polls until the fence carries a task id or the wait budget runs out.
    pub async fn wait_for_fence(&self, fence: &SyncFence) -> JobResult<FenceRecord> {
        let started = Instant::now();

        loop {
            match self.poll_fence(fence, started).await? {
                FenceWaitState::Ready(record) => return Ok(record),
                FenceWaitState::Waiting => tokio::time::sleep(self.config.poll_interval()).await,
                FenceWaitState::TimedOut => {
                    return Err(JobError::FenceWaitTimedOut {
                        fence: fence.fence_key().to_string(),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
            }
        }
    }

    async fn poll_fence(&self, fence: &SyncFence, started: Instant) -> JobResult<FenceWaitState> {
        let record = match fence.payload().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(JobError::FenceNotFound {
                    fence: fence.fence_key().to_string(),
                });
            }
            Err(JobError::FenceSchema { .. }) => {
                return Err(JobError::PayloadInvalid {
                    fence: fence.fence_key().to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        if record.is_ready() {
            Ok(FenceWaitState::Ready(record))
        } else if started.elapsed() >= self.config.fence_wait_timeout() {
            Ok(FenceWaitState::TimedOut)
        } else {
            Ok(FenceWaitState::Waiting)
        }
    }

    async fn fail_invariant(&self, fence: &SyncFence, task_id: &str, error: &JobError) {
        let message = format!(
            "Group sync task could not start: entity_id={} task_id={}: {}",
            fence.key().entity_id,
            task_id,
            error
        );
        tracing::error!(fence = %fence.fence_key(), task_id = %task_id, "{}", message);
        self.errors.emit(&message, Some(fence.key().entity_id));

        if matches!(error, JobError::FenceNotFound { .. }) {
            return;
        }
        if let Err(e) = fence.reset().await {
            tracing::error!(fence = %fence.fence_key(), error = %e, "Failed to reset fence");
        }
    }

    async fn run_locked(
        &self,
        fence: &SyncFence,
        lock: &StoreLock,
        record: &mut FenceRecord,
        envelope: &TaskEnvelope,
        cancel: CancellationToken,
    ) -> JobResult<RunOutcome> {
        record.started_at = Some(Timestamp::now());

        let run = tokio::select! {
            result = self.start_and_sync(fence, lock, record, cancel.clone()) => Some(result),
            _ = tokio::time::sleep(self.config.soft_time_limit()) => None,
            _ = cancel.cancelled() => None,
        };

        match run {
            Some(Ok((items, source))) => {
                tracing::info!(
                    entity_id = fence.key().entity_id,
                    payload_id = %record.id,
                    items,
                    "Group sync finished"
                );
                self.report(fence.key(), SyncStatus::Success).await;
                if self.registry.is_single_flight(source) {
                    self.mark_source_synced(fence.key(), source).await;
                }
                Ok(RunOutcome::Succeeded { items })
            }
            Some(Err(e)) => {
                self.handle_failure(fence, record, &envelope.task_id, &e).await;
                Err(e)
            }
            None => {
                tracing::info!(
                    entity_id = fence.key().entity_id,
                    payload_id = %record.id,
                    "Soft time limit exceeded, group sync is being terminated gracefully"
                );
                self.report(fence.key(), SyncStatus::Failed).await;
                self.clear_side_state(fence).await;
                Ok(RunOutcome::TimedOut)
            }
        }
    }

    async fn start_and_sync(
        &self,
        fence: &SyncFence,
        lock: &StoreLock,
        record: &FenceRecord,
        cancel: CancellationToken,
    ) -> JobResult<(usize, SourceType)> {
        fence.update(record).await?;

        let key = fence.key();
        let entity = self
            .catalog
            .entity(key.entity_id)
            .await?
            .ok_or(JobError::EntityNotFound(key.entity_id))?;
        let policy = self
            .registry
            .policy(entity.source)
            .ok_or(JobError::NoSyncPolicy(entity.source))?;

        tracing::debug!(
            entity_id = key.entity_id,
            source = %entity.source,
            body = policy.body.name(),
            "Running group sync body"
        );

        let source = entity.source;
        let ctx = JobContext {
            work_key: key.clone(),
            entity,
            payload_id: record.id.clone(),
            cancellation_token: cancel,
        };

        self.sink.mark_stale(key).await?;

        let batch_size = self.config.batch_size;
        let mut stream = policy.body.run(ctx);
        let mut batch: Vec<ExternalGroup> = Vec::with_capacity(batch_size);
        let mut total = 0;

        while let Some(group) = stream.try_next().await? {
            batch.push(group);
            if batch.len() >= batch_size {
                self.flush(fence, lock, &mut batch, &mut total).await?;
            }
        }
        if !batch.is_empty() {
            self.flush(fence, lock, &mut batch, &mut total).await?;
        }

        self.sink.remove_stale(key).await?;
        Ok((total, source))
    }

    async fn flush(
        &self,
        fence: &SyncFence,
        lock: &StoreLock,
        batch: &mut Vec<ExternalGroup>,
        total: &mut usize,
    ) -> JobResult<()> {
        self.sink.upsert_batch(fence.key(), batch).await?;
        *total += batch.len();
        batch.clear();

        fence.set_generator_progress(*total).await?;
        lock.reacquire().await?;
        Ok(())
    }

    async fn handle_failure(
        &self,
        fence: &SyncFence,
        record: &FenceRecord,
        task_id: &str,
        error: &JobError,
    ) {
        tracing::warn!(
            entity_id = fence.key().entity_id,
            payload_id = %record.id,
            task_id = %task_id,
            "Group sync exceptioned"
        );
        tracing::error!(error = ?error, "Group sync failed");

        self.report(fence.key(), SyncStatus::Failed).await;
        self.clear_side_state(fence).await;

        self.errors.emit(
            &format!(
                "Group sync failed: entity_id={} payload_id={} task_id={}: {}",
                fence.key().entity_id,
                record.id,
                task_id,
                error
            ),
            Some(fence.key().entity_id),
        );
    }

    async fn clear_side_state(&self, fence: &SyncFence) {
        if let Err(e) = fence.generator_clear().await {
            tracing::error!(fence = %fence.fence_key(), error = %e, "Failed to clear generator state");
        }
        if let Err(e) = fence.taskset_clear().await {
            tracing::error!(fence = %fence.fence_key(), error = %e, "Failed to clear task set");
        }
    }

    /// A single-flight run covers its whole source, so every sibling entity
    /// counts as synced too.
    async fn mark_source_synced(&self, key: &WorkKey, source: SourceType) {
        let siblings = match self.catalog.auto_sync_entities().await {
            Ok(entities) => entities,
            Err(e) => {
                tracing::error!(entity_id = key.entity_id, error = %e, "Failed to list entities to mark synced");
                return;
            }
        };

        for sibling in siblings
            .iter()
            .filter(|entity| entity.source == source && entity.id != key.entity_id)
        {
            let owner = WorkKey::new(key.tenant_id.clone(), sibling.id);
            if let Err(e) = self.status.record_synced(&owner, GROUP_SYNC_JOB).await {
                tracing::error!(entity_id = sibling.id, error = %e, "Failed to mark entity synced");
            }
        }
    }

    async fn report(&self, key: &WorkKey, status: SyncStatus) {
        if let Err(e) = self
            .status
            .record_attempt_result(key, GROUP_SYNC_JOB, status)
            .await
        {
            tracing::error!(entity_id = key.entity_id, error = %e, "Failed to record sync result");
        }
    }
}
