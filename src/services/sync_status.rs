//! Per-entity sync attempt records kept in the fence store.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::jobs::{JobResult, WorkKey};
use crate::store::FenceStore;

/// Job type recorded for group sync attempts.
pub const GROUP_SYNC_JOB: &str = "external_group_sync";

/// Final status of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
}

/// The most recent attempt for one entity and job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub entity_id: i64,
    pub job_type: String,
    pub started_at: Timestamp,
    /// `None` while the attempt is in progress.
    pub status: Option<SyncStatus>,
    pub finished_at: Option<Timestamp>,
}

#[async_trait]
pub trait SyncStatusReporter: Send + Sync {
    async fn record_attempt_start(&self, owner: &WorkKey, job_type: &str) -> JobResult<()>;

    async fn record_attempt_result(
        &self,
        owner: &WorkKey,
        job_type: &str,
        status: SyncStatus,
    ) -> JobResult<()>;

    /// Stamps a last success without an attempt of its own, for entities
    /// covered by another entity's run.
    async fn record_synced(&self, owner: &WorkKey, job_type: &str) -> JobResult<()>;
}

/// Reporter that keeps the latest record and last success time in the store.
#[derive(Clone)]
pub struct StoreSyncStatus {
    store: Arc<dyn FenceStore>,
}

impl StoreSyncStatus {
    pub fn new(store: Arc<dyn FenceStore>) -> Self {
        Self { store }
    }

    fn record_key(owner: &WorkKey, job_type: &str) -> String {
        format!("{}:sync_record_{}_{}", owner.tenant_id, job_type, owner.entity_id)
    }

    fn last_success_key(owner: &WorkKey, job_type: &str) -> String {
        format!("{}:last_success_{}_{}", owner.tenant_id, job_type, owner.entity_id)
    }

    pub async fn latest(&self, owner: &WorkKey, job_type: &str) -> JobResult<Option<SyncRecord>> {
        let raw = self.store.get(&Self::record_key(owner, job_type)).await?;
        Ok(raw.map(|raw| serde_json::from_str::<SyncRecord>(&raw)).transpose()?)
    }

    pub async fn last_success(
        &self,
        owner: &WorkKey,
        job_type: &str,
    ) -> JobResult<Option<Timestamp>> {
        let raw = self.store.get(&Self::last_success_key(owner, job_type)).await?;
        Ok(raw.and_then(|raw| raw.parse().ok()))
    }
}

#[async_trait]
impl SyncStatusReporter for StoreSyncStatus {
    async fn record_attempt_start(&self, owner: &WorkKey, job_type: &str) -> JobResult<()> {
        let record = SyncRecord {
            entity_id: owner.entity_id,
            job_type: job_type.to_string(),
            started_at: Timestamp::now(),
            status: None,
            finished_at: None,
        };
        self.store
            .set(
                &Self::record_key(owner, job_type),
                serde_json::to_string(&record)?,
                None,
            )
            .await?;
        Ok(())
    }

    async fn record_attempt_result(
        &self,
        owner: &WorkKey,
        job_type: &str,
        status: SyncStatus,
    ) -> JobResult<()> {
        let now = Timestamp::now();
        let mut record = self.latest(owner, job_type).await?.unwrap_or(SyncRecord {
            entity_id: owner.entity_id,
            job_type: job_type.to_string(),
            started_at: now,
            status: None,
            finished_at: None,
        });
        record.status = Some(status);
        record.finished_at = Some(now);

        self.store
            .set(
                &Self::record_key(owner, job_type),
                serde_json::to_string(&record)?,
                None,
            )
            .await?;

        if status == SyncStatus::Success {
            self.store
                .set(&Self::last_success_key(owner, job_type), now.to_string(), None)
                .await?;
        }
        Ok(())
    }

    async fn record_synced(&self, owner: &WorkKey, job_type: &str) -> JobResult<()> {
        self.store
            .set(
                &Self::last_success_key(owner, job_type),
                Timestamp::now().to_string(),
                None,
            )
            .await?;
        Ok(())
    }
}
