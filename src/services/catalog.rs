use std::sync::Arc;

use async_trait::async_trait;

use crate::config::settings::EntitySettings;
use crate::jobs::{AccessType, JobResult, SyncEntity, WorkKey};
use crate::services::sync_status::{GROUP_SYNC_JOB, StoreSyncStatus};

/// Source of the entities group sync runs for.
#[async_trait]
pub trait EntityCatalog: Send + Sync {
    /// Entities opted into automatic group sync, ordered by id.
    async fn auto_sync_entities(&self) -> JobResult<Vec<SyncEntity>>;

    async fn entity(&self, id: i64) -> JobResult<Option<SyncEntity>>;
}

/// Catalog backed by the `[[entities]]` configuration, with last success
/// times read from the sync status records.
#[derive(Clone)]
pub struct ConfiguredCatalog {
    tenant_id: String,
    entities: Vec<EntitySettings>,
    status: Arc<StoreSyncStatus>,
}

impl ConfiguredCatalog {
    pub fn new(
        tenant_id: impl Into<String>,
        entities: Vec<EntitySettings>,
        status: Arc<StoreSyncStatus>,
    ) -> Self {
        let mut entities = entities;
        entities.sort_by_key(|entity| entity.id);
        Self {
            tenant_id: tenant_id.into(),
            entities,
            status,
        }
    }

    async fn resolve(&self, settings: &EntitySettings) -> JobResult<SyncEntity> {
        let owner = WorkKey::new(self.tenant_id.clone(), settings.id);
        let last_synced_at = self.status.last_success(&owner, GROUP_SYNC_JOB).await?;

        Ok(SyncEntity {
            id: settings.id,
            source: settings.source,
            status: settings.status,
            access_type: settings.access_type,
            last_synced_at,
        })
    }
}

#[async_trait]
impl EntityCatalog for ConfiguredCatalog {
    async fn auto_sync_entities(&self) -> JobResult<Vec<SyncEntity>> {
        let mut entities = Vec::new();
        for settings in self
            .entities
            .iter()
            .filter(|entity| entity.access_type == AccessType::Sync)
        {
            entities.push(self.resolve(settings).await?);
        }
        Ok(entities)
    }

    async fn entity(&self, id: i64) -> JobResult<Option<SyncEntity>> {
        match self.entities.iter().find(|entity| entity.id == id) {
            Some(settings) => Ok(Some(self.resolve(settings).await?)),
            None => Ok(None),
        }
    }
}
