//! Process-wide collaborators.
//!
//! Everything the scheduler, the runner and the validator need is built once
//! here and handed to them explicitly.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::AppResult;
use crate::jobs::{
    BeatScheduler, FenceValidator, JobRunner, SourceRegistry, TenantKeys, WorkerPool,
};
use crate::queue::{QueueTransport, connect_queue};
use crate::services::{
    BackgroundErrorSink, ConfiguredCatalog, EntityCatalog, GroupSink, LoggingSink,
    StoreSyncStatus, SyncStatusReporter, TracingErrorSink,
};
use crate::store::{FenceStore, connect_store};

/// Cloning is cheap since every collaborator is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn FenceStore>,
    pub queue: Arc<dyn QueueTransport>,
    pub registry: Arc<SourceRegistry>,
    pub catalog: Arc<dyn EntityCatalog>,
    pub status: Arc<dyn SyncStatusReporter>,
    pub sink: Arc<dyn GroupSink>,
    pub errors: Arc<dyn BackgroundErrorSink>,
}

impl AppState {
    /// Connects the configured backends and wires the production
    /// collaborators.
    pub async fn new(settings: Settings) -> AppResult<Self> {
        let store = connect_store(&settings.store).await?;
        let queue = connect_queue(&settings.queue).await?;
        let registry = SourceRegistry::from_settings(&settings.sources)?;

        let status = Arc::new(StoreSyncStatus::new(store.clone()));
        let catalog = ConfiguredCatalog::new(
            settings.beat.tenant_id.clone(),
            settings.entities.clone(),
            status.clone(),
        );

        tracing::debug!(
            tenant_id = %settings.beat.tenant_id,
            sources = registry.len(),
            entities = settings.entities.len(),
            "Application state initialized"
        );

        Ok(Self {
            settings: Arc::new(settings),
            store,
            queue,
            registry: Arc::new(registry),
            catalog: Arc::new(catalog),
            status,
            sink: Arc::new(LoggingSink),
            errors: Arc::new(TracingErrorSink),
        })
    }

    pub fn tenant(&self) -> TenantKeys {
        TenantKeys::new(self.settings.beat.tenant_id.clone())
    }

    pub fn validator(&self) -> FenceValidator {
        FenceValidator::new(
            self.store.clone(),
            self.queue.clone(),
            self.errors.clone(),
            self.tenant(),
            self.settings.queue.name.clone(),
            self.settings.validator.clone(),
            self.settings.runner.fence_wait_timeout(),
        )
    }

    pub fn beat_scheduler(&self) -> BeatScheduler {
        BeatScheduler::new(self)
    }

    pub fn runner(&self) -> JobRunner {
        JobRunner::new(self)
    }

    pub fn worker_pool(&self, concurrency: usize) -> WorkerPool {
        WorkerPool::new(self, concurrency)
    }
}
