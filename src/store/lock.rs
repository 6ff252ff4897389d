//! TTL-bounded mutual exclusion on top of a [`FenceStore`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::store::{FenceStore, StoreError, StoreResult};

/// Interval between attempts while waiting for a contended lock.
const BLOCKING_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// A named lock whose ownership is proven by a random token.
///
/// The lock expires on its own after `ttl`, so a crashed holder never blocks
/// others forever. Holders of long critical sections must call
/// [`StoreLock::reacquire`] before the TTL runs out.
pub struct StoreLock {
    store: Arc<dyn FenceStore>,
    name: String,
    token: String,
    ttl: Duration,
}

impl StoreLock {
    pub fn new(store: Arc<dyn FenceStore>, name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            name: name.into(),
            token: Uuid::new_v4().simple().to_string(),
            ttl,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try to take the lock.
    ///
    /// With `blocking_timeout = None` this is a single attempt. Otherwise
    /// attempts are repeated until the timeout elapses.
    pub async fn acquire(&self, blocking_timeout: Option<Duration>) -> StoreResult<bool> {
        let deadline = blocking_timeout.map(|timeout| Instant::now() + timeout);

        loop {
            if self.store.try_lock(&self.name, &self.token, self.ttl).await? {
                return Ok(true);
            }

            match deadline {
                Some(deadline) if Instant::now() + BLOCKING_RETRY_INTERVAL <= deadline => {
                    tokio::time::sleep(BLOCKING_RETRY_INTERVAL).await;
                }
                _ => return Ok(false),
            }
        }
    }

    /// Reset the lock's TTL to its full length.
    pub async fn reacquire(&self) -> StoreResult<()> {
        if self
            .store
            .extend_lock(&self.name, &self.token, self.ttl)
            .await?
        {
            Ok(())
        } else {
            Err(StoreError::LockNotOwned(self.name.clone()))
        }
    }

    /// Whether the lock is currently held by this instance.
    pub async fn owned(&self) -> StoreResult<bool> {
        Ok(self.store.lock_token(&self.name).await?.as_deref() == Some(self.token.as_str()))
    }

    /// Release the lock. Releasing a lock that already expired is not an error.
    pub async fn release(&self) -> StoreResult<bool> {
        self.store.unlock(&self.name, &self.token).await
    }

    /// Release the lock if it is still ours, logging instead of failing.
    ///
    /// Used on cleanup paths that must not raise.
    pub async fn release_if_owned(&self) {
        match self.owned().await {
            Ok(true) => {
                if let Err(e) = self.release().await {
                    tracing::warn!(lock = %self.name, error = %e, "Failed to release lock");
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(lock = %self.name, error = %e, "Failed to check lock ownership");
            }
        }
    }
}

impl std::fmt::Debug for StoreLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLock")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .finish()
    }
}
