//! FenceStore trait definition.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::store::StoreResult;

/// Key-value operations the coordination protocol relies on.
///
/// Every backend must make the lock primitives atomic: `try_lock` is a
/// set-if-absent with expiry, `extend_lock` and `unlock` only act when the
/// stored token matches the caller's.
#[async_trait]
pub trait FenceStore: Send + Sync {
    /// Get a string value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set a string value with an optional expiry.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<()>;

    /// Set a value only if the key does not exist yet. Returns whether it was written.
    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> StoreResult<bool>;

    /// Delete a key. Returns whether something was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Check whether a key exists.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// All members of a set. A missing set is empty.
    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>>;

    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()>;

    async fn remove_from_set(&self, key: &str, member: &str) -> StoreResult<()>;

    /// Try to take a lock without waiting.
    async fn try_lock(&self, name: &str, token: &str, ttl: Duration) -> StoreResult<bool>;

    /// Reset the expiry of a lock held under `token`.
    async fn extend_lock(&self, name: &str, token: &str, ttl: Duration) -> StoreResult<bool>;

    /// Release a lock held under `token`.
    async fn unlock(&self, name: &str, token: &str) -> StoreResult<bool>;

    /// Current token of a lock, if held by anyone.
    async fn lock_token(&self, name: &str) -> StoreResult<Option<String>>;
}
