use async_trait::async_trait;

use crate::jobs::{ExternalGroup, JobResult, WorkKey};

/// Destination for synced groups.
///
/// A run calls `mark_stale` once, `upsert_batch` zero or more times, then
/// `remove_stale` once; groups not upserted since `mark_stale` are dropped.
#[async_trait]
pub trait GroupSink: Send + Sync {
    async fn mark_stale(&self, _owner: &WorkKey) -> JobResult<()> {
        Ok(())
    }

    async fn upsert_batch(&self, owner: &WorkKey, groups: &[ExternalGroup]) -> JobResult<()>;

    async fn remove_stale(&self, owner: &WorkKey) -> JobResult<()>;
}

/// Sink that only logs what it receives.
#[derive(Debug, Clone, Default)]
pub struct LoggingSink;

#[async_trait]
impl GroupSink for LoggingSink {
    async fn upsert_batch(&self, owner: &WorkKey, groups: &[ExternalGroup]) -> JobResult<()> {
        tracing::info!(
            owner = %owner,
            count = groups.len(),
            first = ?groups.first().map(|group| group.id.as_str()),
            "Upserting external group batch"
        );
        Ok(())
    }

    async fn remove_stale(&self, owner: &WorkKey) -> JobResult<()> {
        tracing::info!(owner = %owner, "Removing stale external groups");
        Ok(())
    }
}
