//! Reconciles the active fence index against what the queue transport can see.
//!
//! A fence whose task is neither enqueued nor reserved cannot be justified
//! and is reset, so the work key becomes claimable again.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jiff::{SignedDuration, Timestamp};

use crate::config::settings::ValidatorConfig;
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::fence::SyncFence;
use crate::jobs::keys::{TenantKeys, WorkKey, is_group_sync_fence};
use crate::queue::QueueTransport;
use crate::services::BackgroundErrorSink;
use crate::store::{FenceStore, StoreLock};

/// What the validator concluded about one index member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceVerdict {
    /// The fence was already gone; the index entry was removed.
    Pruned,
    /// The record no longer decodes and was reset.
    ResetCorrupt,
    /// No task id yet; the claim is still in progress.
    Pending,
    /// No task id long after submission; the claimer is gone and the fence
    /// was reset.
    Abandoned,
    /// The task is waiting in the queue.
    Enqueued,
    /// A worker holds the task.
    Reserved,
    /// The task is in neither snapshot but its active signal is alive.
    Bridged,
    /// The task is gone and the fence was reset.
    Reset,
    /// The member looks like a group sync fence but its id does not parse.
    Unparseable,
}

/// Totals for one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub scanned: usize,
    pub pruned: usize,
    pub reset: usize,
    pub kept: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl ValidationReport {
    fn record(&mut self, verdict: FenceVerdict) {
        match verdict {
            FenceVerdict::Pruned => self.pruned += 1,
            FenceVerdict::ResetCorrupt | FenceVerdict::Abandoned | FenceVerdict::Reset => {
                self.reset += 1
            }
            FenceVerdict::Pending
            | FenceVerdict::Enqueued
            | FenceVerdict::Reserved
            | FenceVerdict::Bridged => self.kept += 1,
            FenceVerdict::Unparseable => self.skipped += 1,
        }
    }
}

/// Task ids the queue transport could see when a pass started.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub enqueued: HashSet<String>,
    pub reserved: HashSet<String>,
}

#[derive(Clone)]
pub struct FenceValidator {
    store: Arc<dyn FenceStore>,
    queue: Arc<dyn QueueTransport>,
    errors: Arc<dyn BackgroundErrorSink>,
    tenant: TenantKeys,
    queue_name: String,
    config: ValidatorConfig,
    claim_window: Duration,
}

impl FenceValidator {
    pub fn new(
        store: Arc<dyn FenceStore>,
        queue: Arc<dyn QueueTransport>,
        errors: Arc<dyn BackgroundErrorSink>,
        tenant: TenantKeys,
        queue_name: impl Into<String>,
        config: ValidatorConfig,
        claim_window: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            errors,
            tenant,
            queue_name: queue_name.into(),
            config,
            claim_window,
        }
    }

    /// Reads both queue views, enqueued first so a task moving to a worker
    /// in between is still seen in one of them.
    pub async fn snapshot(&self) -> JobResult<QueueSnapshot> {
        let enqueued = self.queue.enqueued_task_ids(&self.queue_name).await?;
        let reserved = self.queue.reserved_task_ids(&self.queue_name).await?;
        Ok(QueueSnapshot { enqueued, reserved })
    }

    /// Validates every group sync fence in the index. `lock` is the beat
    /// lock and is renewed after each member; losing it aborts the pass.
    /// Failures on one member are logged and do not stop the others.
    pub async fn validate_fences(&self, lock: &StoreLock) -> JobResult<ValidationReport> {
        lock.reacquire().await?;

        let members = self.store.set_members(&self.tenant.active_fences()).await?;
        let snapshot = self.snapshot().await?;
        let mut report = ValidationReport::default();

        for member in members {
            if !is_group_sync_fence(&member) {
                continue;
            }
            report.scanned += 1;

            match self.validate_fence(&member, &snapshot).await {
                Ok(verdict) => {
                    tracing::debug!(fence = %member, verdict = ?verdict, "Fence validated");
                    report.record(verdict);
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(fence = %member, error = %e, "Fence validation failed");
                }
            }

            lock.reacquire().await?;
        }

        tracing::info!(
            tenant_id = %self.tenant.tenant_id(),
            scanned = report.scanned,
            reset = report.reset,
            pruned = report.pruned,
            kept = report.kept,
            "Fence validation finished"
        );
        Ok(report)
    }

    /// Reconciles one index member against `snapshot`.
    pub async fn validate_fence(
        &self,
        fence_key: &str,
        snapshot: &QueueSnapshot,
    ) -> JobResult<FenceVerdict> {
        let Some(key) = WorkKey::from_fence_key(fence_key) else {
            self.errors.emit(
                &format!("Could not parse entity id from fence key: {}", fence_key),
                None,
            );
            return Ok(FenceVerdict::Unparseable);
        };

        let fence = SyncFence::new(self.store.clone(), key);
        if !fence.fenced().await? {
            self.store
                .remove_from_set(&self.tenant.active_fences(), fence_key)
                .await?;
            return Ok(FenceVerdict::Pruned);
        }

        let record = match fence.payload().await {
            Ok(Some(record)) => record,
            // Cleared between the two reads.
            Ok(None) => return Ok(FenceVerdict::Pruned),
            Err(JobError::FenceSchema { source, .. }) => {
                tracing::error!(
                    fence = %fence_key,
                    error = %source,
                    "Resetting fence with a payload that does not match the current schema"
                );
                self.errors.emit(
                    &format!("Resetting corrupt fence {}: {}", fence_key, source),
                    Some(fence.key().entity_id),
                );
                fence.reset().await?;
                return Ok(FenceVerdict::ResetCorrupt);
            }
            Err(e) => return Err(e),
        };

        let Some(task_id) = record.task_id.as_deref() else {
            let age = Timestamp::now().duration_since(record.submitted_at);
            if age < SignedDuration::try_from(self.claim_window).unwrap_or(SignedDuration::MAX) {
                return Ok(FenceVerdict::Pending);
            }

            let message = format!(
                "Resetting fence that never received a task id: entity_id={} fence={} payload_id={} age={}s",
                fence.key().entity_id,
                fence_key,
                record.id,
                age.as_secs()
            );
            tracing::warn!(fence = %fence_key, payload_id = %record.id, "{}", message);
            self.errors.emit(&message, Some(fence.key().entity_id));

            fence.reset().await?;
            return Ok(FenceVerdict::Abandoned);
        };

        if snapshot.enqueued.contains(task_id) {
            fence.set_active(self.config.active_signal_ttl()).await?;
            return Ok(FenceVerdict::Enqueued);
        }

        if snapshot.reserved.contains(task_id) {
            fence.set_active(self.config.active_signal_ttl()).await?;
            return Ok(FenceVerdict::Reserved);
        }

        if self.config.honor_active_signal && fence.active().await? {
            tracing::info!(
                fence = %fence_key,
                task_id = %task_id,
                "Task not visible but fence is still signalled active"
            );
            return Ok(FenceVerdict::Bridged);
        }

        let message = format!(
            "Resetting fence because no associated task was found: entity_id={} fence={} task_id={} payload_id={}",
            fence.key().entity_id,
            fence_key,
            task_id,
            record.id
        );
        tracing::warn!(fence = %fence_key, task_id = %task_id, payload_id = %record.id, "{}", message);
        self.errors.emit(&message, Some(fence.key().entity_id));

        fence.reset().await?;
        Ok(FenceVerdict::Reset)
    }
}
