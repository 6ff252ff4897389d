//! Backend selection for the fence store.

use std::sync::Arc;

use crate::config::settings::{StoreBackend, StoreConfig};
use crate::store::memory::MemoryStore;
use crate::store::redis::RedisStore;
use crate::store::{FenceStore, StoreResult};

/// Build the configured fence store.
///
/// Called once per process; the returned handle is shared by the scheduler,
/// the runner and the validator.
pub async fn connect_store(config: &StoreConfig) -> StoreResult<Arc<dyn FenceStore>> {
    let store: Arc<dyn FenceStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Redis => Arc::new(RedisStore::new(&config.redis).await?),
    };

    tracing::debug!(backend = ?config.backend, "Fence store connected");
    Ok(store)
}
