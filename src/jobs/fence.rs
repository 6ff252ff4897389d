//! The fence record and the store-backed handle around it.
//!
//! A fence exists in the store exactly while a unit of work is claimed. Its
//! key is also listed in the tenant's active fence index so the validator can
//! find fences whose task is gone.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::keys::{TenantKeys, WorkKey};
use crate::store::{FenceStore, StoreResult};

/// Persisted claim on one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FenceRecord {
    /// Short payload id for log correlation.
    pub id: String,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
    /// `None` until the task has been dispatched.
    pub task_id: Option<String>,
}

impl FenceRecord {
    pub fn new() -> Self {
        Self {
            id: make_short_id(),
            submitted_at: Timestamp::now(),
            started_at: None,
            task_id: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.task_id.is_some()
    }
}

impl Default for FenceRecord {
    fn default() -> Self {
        Self::new()
    }
}

pub fn make_short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Handle on the fence and its companion keys for one work key.
#[derive(Clone)]
pub struct SyncFence {
    store: Arc<dyn FenceStore>,
    key: WorkKey,
    index_key: String,
    fence_key: String,
}

impl SyncFence {
    pub fn new(store: Arc<dyn FenceStore>, key: WorkKey) -> Self {
        let index_key = TenantKeys::new(key.tenant_id.clone()).active_fences();
        let fence_key = key.fence_key();
        Self {
            store,
            key,
            index_key,
            fence_key,
        }
    }

    pub fn key(&self) -> &WorkKey {
        &self.key
    }

    pub fn fence_key(&self) -> &str {
        &self.fence_key
    }

    pub async fn fenced(&self) -> StoreResult<bool> {
        self.store.exists(&self.fence_key).await
    }

    /// Reads the record. A payload that no longer decodes is reported as
    /// [`JobError::FenceSchema`].
    pub async fn payload(&self) -> JobResult<Option<FenceRecord>> {
        let Some(raw) = self.store.get(&self.fence_key).await? else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| JobError::FenceSchema {
                fence: self.fence_key.clone(),
                source,
            })
    }

    /// Writes the record only when no fence exists yet. Returns `false` when
    /// another claimer got there first.
    pub async fn create(&self, record: &FenceRecord) -> JobResult<bool> {
        self.store
            .add_to_set(&self.index_key, &self.fence_key)
            .await?;
        let raw = serde_json::to_string(record)?;
        Ok(self.store.set_if_absent(&self.fence_key, raw, None).await?)
    }

    /// Overwrites the record and re-asserts the index entry.
    pub async fn update(&self, record: &FenceRecord) -> JobResult<()> {
        self.store
            .add_to_set(&self.index_key, &self.fence_key)
            .await?;
        let raw = serde_json::to_string(record)?;
        self.store.set(&self.fence_key, raw, None).await?;
        Ok(())
    }

    /// Deletes the fence, then its index entry.
    pub async fn clear(&self) -> StoreResult<()> {
        self.store.delete(&self.fence_key).await?;
        self.store
            .remove_from_set(&self.index_key, &self.fence_key)
            .await
    }

    /// Clears the fence and every companion key.
    pub async fn reset(&self) -> StoreResult<()> {
        self.clear().await?;
        self.store.delete(&self.key.active_key()).await?;
        self.generator_clear().await?;
        self.taskset_clear().await
    }

    pub async fn set_active(&self, ttl: Duration) -> StoreResult<()> {
        self.store
            .set(&self.key.active_key(), "1".to_string(), Some(ttl))
            .await
    }

    pub async fn active(&self) -> StoreResult<bool> {
        self.store.exists(&self.key.active_key()).await
    }

    pub async fn set_generator_progress(&self, items: usize) -> StoreResult<()> {
        self.store
            .set(&self.key.generator_key(), items.to_string(), None)
            .await
    }

    pub async fn generator_progress(&self) -> StoreResult<Option<usize>> {
        Ok(self
            .store
            .get(&self.key.generator_key())
            .await?
            .and_then(|raw| raw.parse().ok()))
    }

    pub async fn generator_clear(&self) -> StoreResult<()> {
        self.store.delete(&self.key.generator_key()).await.map(|_| ())
    }

    pub async fn taskset_add(&self, task_id: &str) -> StoreResult<()> {
        self.store.add_to_set(&self.key.taskset_key(), task_id).await
    }

    pub async fn taskset_members(&self) -> StoreResult<HashSet<String>> {
        self.store.set_members(&self.key.taskset_key()).await
    }

    pub async fn taskset_clear(&self) -> StoreResult<()> {
        self.store.delete(&self.key.taskset_key()).await.map(|_| ())
    }
}

impl std::fmt::Debug for SyncFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncFence")
            .field("fence_key", &self.fence_key)
            .finish()
    }
}
