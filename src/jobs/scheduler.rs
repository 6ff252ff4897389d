//! One scheduling pass for a tenant: find due entities, claim each with a
//! fence and dispatch a group sync task, then validate fences when the
//! cool-down allows.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use tokio::time::Instant;

use crate::config::settings::{BeatConfig, QueueConfig};
use crate::jobs::error::JobResult;
use crate::jobs::fence::{FenceRecord, SyncFence};
use crate::jobs::keys::TenantKeys;
use crate::jobs::registry::SourceRegistry;
use crate::jobs::types::{AccessType, SourceType, SyncEntity};
use crate::jobs::validator::{FenceValidator, ValidationReport};
use crate::queue::{JobDescriptor, QueueTransport};
use crate::services::{EntityCatalog, GROUP_SYNC_JOB, SyncStatusReporter};
use crate::store::{FenceStore, StoreLock};

/// Task name workers dispatch on.
pub const GROUP_SYNC_TASK: &str = "group_sync";

/// Whether an entity can be scheduled at all.
pub fn is_eligible(entity: &SyncEntity, registry: &SourceRegistry) -> bool {
    if entity.access_type != AccessType::Sync {
        tracing::error!(
            entity_id = entity.id,
            access_type = ?entity.access_type,
            "Entity reached group sync scheduling without sync access"
        );
        return false;
    }

    if entity.is_deleting() {
        return false;
    }

    registry.policy(entity.source).is_some()
}

/// Keeps only the lowest id entity of every single-flight source. Output is
/// in ascending id order.
pub fn dedupe_single_flight(
    mut entities: Vec<SyncEntity>,
    is_single_flight: impl Fn(SourceType) -> bool,
) -> Vec<SyncEntity> {
    entities.sort_by_key(|entity| entity.id);

    let mut seen = HashSet::new();
    entities.retain(|entity| !is_single_flight(entity.source) || seen.insert(entity.source));
    entities
}

/// Due when never synced, or when `frequency` has passed since the last
/// successful sync.
pub fn is_sync_due(entity: &SyncEntity, frequency: Duration, now: Timestamp) -> bool {
    match entity.last_synced_at {
        None => true,
        Some(last) => match last.checked_add(frequency) {
            Ok(next) => now >= next,
            Err(_) => false,
        },
    }
}

/// Outcome of one scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeatReport {
    pub due: usize,
    /// Entity ids a task was dispatched for.
    pub dispatched: Vec<i64>,
    pub validation: Option<ValidationReport>,
    pub timed_out: bool,
}

pub struct BeatScheduler {
    store: Arc<dyn FenceStore>,
    queue: Arc<dyn QueueTransport>,
    registry: Arc<SourceRegistry>,
    catalog: Arc<dyn EntityCatalog>,
    status: Arc<dyn SyncStatusReporter>,
    validator: FenceValidator,
    tenant: TenantKeys,
    beat: BeatConfig,
    queue_config: QueueConfig,
    active_signal_ttl: Duration,
}

impl BeatScheduler {
    pub fn new(state: &crate::AppState) -> Self {
        let settings = &state.settings;
        Self {
            store: state.store.clone(),
            queue: state.queue.clone(),
            registry: state.registry.clone(),
            catalog: state.catalog.clone(),
            status: state.status.clone(),
            validator: state.validator(),
            tenant: TenantKeys::new(settings.beat.tenant_id.clone()),
            beat: settings.beat.clone(),
            queue_config: settings.queue.clone(),
            active_signal_ttl: settings.validator.active_signal_ttl(),
        }
    }

    pub fn tenant(&self) -> &TenantKeys {
        &self.tenant
    }

    /// Runs one pass under the tenant beat lock. Returns `None` when another
    /// scheduler holds the lock.
    pub async fn check_for_group_sync(&self) -> JobResult<Option<BeatReport>> {
        let lock = StoreLock::new(self.store.clone(), self.tenant.beat_lock(), self.beat.lock_ttl());
        if !lock.acquire(None).await? {
            tracing::debug!(tenant_id = %self.tenant.tenant_id(), "Beat lock held elsewhere, skipping pass");
            return Ok(None);
        }

        let mut report = BeatReport::default();
        let deadline = Instant::now() + self.beat.soft_time_limit();

        if let Err(e) = self.run_pass(&lock, deadline, &mut report).await {
            tracing::warn!(tenant_id = %self.tenant.tenant_id(), error = %e, "Unexpected error in group sync beat");
        }
        if report.timed_out {
            tracing::info!(
                tenant_id = %self.tenant.tenant_id(),
                "Soft time limit exceeded, beat pass is being terminated gracefully"
            );
        }

        lock.release_if_owned().await;

        tracing::info!(
            tenant_id = %self.tenant.tenant_id(),
            due = report.due,
            dispatched = report.dispatched.len(),
            "Group sync beat finished"
        );
        Ok(Some(report))
    }

    /// Claims are never interrupted midway, so the deadline is checked
    /// between them. Validation may be cut short since every reset step
    /// leaves state the next pass repairs.
    async fn run_pass(
        &self,
        lock: &StoreLock,
        deadline: Instant,
        report: &mut BeatReport,
    ) -> JobResult<()> {
        let due = self.due_entities().await?;
        report.due = due.len();

        lock.reacquire().await?;

        for entity in &due {
            if Instant::now() >= deadline {
                report.timed_out = true;
                return Ok(());
            }
            if let Some(payload_id) = self.try_creating_sync_task(entity).await {
                tracing::info!(
                    entity_id = entity.id,
                    source = %entity.source,
                    payload_id = %payload_id,
                    "Group sync queued"
                );
                report.dispatched.push(entity.id);
            }
        }

        lock.reacquire().await?;

        let block_key = self.tenant.block_validate();
        if !self.store.exists(&block_key).await? {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.validator.validate_fences(lock)).await {
                Ok(Ok(validation)) => report.validation = Some(validation),
                Ok(Err(e)) => {
                    tracing::error!(tenant_id = %self.tenant.tenant_id(), error = %e, "Fence validation failed");
                }
                Err(_) => {
                    report.timed_out = true;
                    return Ok(());
                }
            }

            self.store
                .set(&block_key, "1".to_string(), Some(self.beat.validation_cooldown()))
                .await?;
        }

        Ok(())
    }

    /// Eligible, deduplicated entities whose sync is due, in id order.
    pub async fn due_entities(&self) -> JobResult<Vec<SyncEntity>> {
        let eligible: Vec<SyncEntity> = self
            .catalog
            .auto_sync_entities()
            .await?
            .into_iter()
            .filter(|entity| is_eligible(entity, &self.registry))
            .collect();

        let now = Timestamp::now();
        Ok(
            dedupe_single_flight(eligible, |source| self.registry.is_single_flight(source))
                .into_iter()
                .filter(|entity| {
                    self.registry
                        .policy(entity.source)
                        .is_some_and(|policy| is_sync_due(entity, policy.sync_frequency, now))
                })
                .collect(),
        )
    }

    /// Claims the entity and dispatches its task. Returns the fence payload
    /// id on success; every failure is logged and yields `None`.
    pub async fn try_creating_sync_task(&self, entity: &SyncEntity) -> Option<String> {
        let fence = SyncFence::new(self.store.clone(), self.tenant.work_key(entity.id));

        match self.claim(&fence).await {
            Ok(payload_id) => payload_id,
            Err(e) => {
                tracing::warn!(
                    entity_id = entity.id,
                    fence = %fence.fence_key(),
                    error = %e,
                    "Unexpected exception while trying to create group sync task"
                );
                None
            }
        }
    }

    async fn claim(&self, fence: &SyncFence) -> JobResult<Option<String>> {
        if fence.fenced().await? {
            tracing::debug!(fence = %fence.fence_key(), "Group sync already in flight");
            return Ok(None);
        }

        let key = fence.key();
        if let Err(e) = self.status.record_attempt_start(key, GROUP_SYNC_JOB).await {
            tracing::error!(entity_id = key.entity_id, error = %e, "Failed to record sync attempt start");
        }

        let mut record = FenceRecord::new();
        if !fence.create(&record).await? {
            tracing::info!(fence = %fence.fence_key(), "Fence claimed concurrently");
            return Ok(None);
        }

        match self.dispatch_claimed(fence, &mut record).await {
            Ok(()) => Ok(Some(record.id)),
            Err(e) => {
                if let Err(reset_error) = fence.reset().await {
                    tracing::error!(fence = %fence.fence_key(), error = %reset_error, "Failed to reset fence after failed claim");
                }
                Err(e)
            }
        }
    }

    /// Everything after the fence is won. Any error leaves the fence for the
    /// caller to reset.
    async fn dispatch_claimed(&self, fence: &SyncFence, record: &mut FenceRecord) -> JobResult<()> {
        // Side state belongs to the winning claim only.
        fence.generator_clear().await?;
        fence.taskset_clear().await?;
        fence.set_active(self.active_signal_ttl).await?;

        let key = fence.key();
        let task_id = key.new_task_id();
        let descriptor = JobDescriptor {
            task_name: GROUP_SYNC_TASK.to_string(),
            tenant_id: key.tenant_id.clone(),
            entity_id: key.entity_id,
        };

        let accepted = self
            .queue
            .dispatch(&descriptor, &task_id, &self.queue_config.name, self.queue_config.priority)
            .await?;

        fence.taskset_add(&accepted).await?;
        record.task_id = Some(accepted);
        fence.update(record).await?;
        Ok(())
    }
}
