//! Recording collaborators and fixtures for the group sync tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;

use crate::config::Settings;
use crate::jobs::registry::{GroupStream, JobBody, SourceRegistry, SyncPolicy};
use crate::jobs::{
    AccessType, EntityStatus, ExternalGroup, JobContext, JobError, JobResult, SourceType,
    SyncEntity, WorkKey,
};
use crate::queue::{
    JobDescriptor, MemoryQueue, QueueStats, QueueTransport, ReservedTask, TaskOutcome,
    TaskPriority, TransportError, TransportResult,
};
use crate::services::{BackgroundErrorSink, EntityCatalog, GroupSink, SyncStatus, SyncStatusReporter};
use crate::store::{FenceStore, MemoryStore};
use crate::AppState;

pub const TENANT: &str = "t1";

/// Yields `count` groups, then optionally fails.
#[derive(Debug, Clone)]
pub struct VecBody {
    count: usize,
    fails: bool,
}

impl VecBody {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            fails: false,
        }
    }

    pub fn failing_after(count: usize) -> Self {
        Self {
            count,
            fails: true,
        }
    }
}

impl JobBody for VecBody {
    fn name(&self) -> &'static str {
        "vec"
    }

    fn run(&self, ctx: JobContext) -> GroupStream {
        let entity_id = ctx.entity.id;
        let groups = (0..self.count).map(move |i| {
            Ok(ExternalGroup {
                id: format!("group-{}-{}", entity_id, i),
                user_emails: vec![format!("user{}@example.com", i)],
                gives_anyone_access: false,
            })
        });

        if self.fails {
            stream::iter(groups)
                .chain(stream::once(async {
                    Err(JobError::ExecutionFailed("directory unavailable".to_string()))
                }))
                .boxed()
        } else {
            stream::iter(groups).boxed()
        }
    }
}

/// Never yields; only a timeout or cancellation ends it.
#[derive(Debug, Clone, Default)]
pub struct PendingBody;

impl JobBody for PendingBody {
    fn name(&self) -> &'static str {
        "pending"
    }

    fn run(&self, _ctx: JobContext) -> GroupStream {
        stream::pending().boxed()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub marked: Mutex<usize>,
    pub batches: Mutex<Vec<usize>>,
    pub removed: Mutex<usize>,
}

impl RecordingSink {
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn removed(&self) -> usize {
        *self.removed.lock().unwrap()
    }

    pub fn marked(&self) -> usize {
        *self.marked.lock().unwrap()
    }
}

#[async_trait]
impl GroupSink for RecordingSink {
    async fn mark_stale(&self, _owner: &WorkKey) -> JobResult<()> {
        *self.marked.lock().unwrap() += 1;
        Ok(())
    }

    async fn upsert_batch(&self, _owner: &WorkKey, groups: &[ExternalGroup]) -> JobResult<()> {
        self.batches.lock().unwrap().push(groups.len());
        Ok(())
    }

    async fn remove_stale(&self, _owner: &WorkKey) -> JobResult<()> {
        *self.removed.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    pub starts: Mutex<Vec<i64>>,
    pub results: Mutex<Vec<(i64, SyncStatus)>>,
    pub synced: Mutex<Vec<i64>>,
}

impl RecordingStatus {
    pub fn synced(&self) -> Vec<i64> {
        self.synced.lock().unwrap().clone()
    }

    pub fn starts(&self) -> Vec<i64> {
        self.starts.lock().unwrap().clone()
    }

    pub fn results(&self) -> Vec<(i64, SyncStatus)> {
        self.results.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncStatusReporter for RecordingStatus {
    async fn record_attempt_start(&self, owner: &WorkKey, _job_type: &str) -> JobResult<()> {
        self.starts.lock().unwrap().push(owner.entity_id);
        Ok(())
    }

    async fn record_attempt_result(
        &self,
        owner: &WorkKey,
        _job_type: &str,
        status: SyncStatus,
    ) -> JobResult<()> {
        self.results.lock().unwrap().push((owner.entity_id, status));
        Ok(())
    }

    async fn record_synced(&self, owner: &WorkKey, _job_type: &str) -> JobResult<()> {
        self.synced.lock().unwrap().push(owner.entity_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingErrors {
    pub events: Mutex<Vec<(String, Option<i64>)>>,
}

impl RecordingErrors {
    pub fn events(&self) -> Vec<(String, Option<i64>)> {
        self.events.lock().unwrap().clone()
    }
}

impl BackgroundErrorSink for RecordingErrors {
    fn emit(&self, message: &str, entity_id: Option<i64>) {
        self.events
            .lock()
            .unwrap()
            .push((message.to_string(), entity_id));
    }
}

/// Catalog over a fixed entity list.
#[derive(Default)]
pub struct FixedCatalog {
    pub entities: Vec<SyncEntity>,
}

#[async_trait]
impl EntityCatalog for FixedCatalog {
    async fn auto_sync_entities(&self) -> JobResult<Vec<SyncEntity>> {
        let mut entities = self.entities.clone();
        entities.sort_by_key(|entity| entity.id);
        Ok(entities)
    }

    async fn entity(&self, id: i64) -> JobResult<Option<SyncEntity>> {
        Ok(self.entities.iter().find(|entity| entity.id == id).cloned())
    }
}

/// Memory queue whose dispatch can be switched to fail or to stall, and
/// which counts snapshot reads.
#[derive(Default)]
pub struct FlakyQueue {
    pub inner: MemoryQueue,
    pub fail_dispatch: Mutex<bool>,
    pub dispatch_delay: Mutex<Option<Duration>>,
    pub snapshot_reads: Mutex<usize>,
}

impl FlakyQueue {
    pub fn snapshot_reads(&self) -> usize {
        *self.snapshot_reads.lock().unwrap()
    }
}

#[async_trait]
impl QueueTransport for FlakyQueue {
    async fn dispatch(
        &self,
        descriptor: &JobDescriptor,
        task_id: &str,
        queue: &str,
        priority: TaskPriority,
    ) -> TransportResult<String> {
        if *self.fail_dispatch.lock().unwrap() {
            return Err(TransportError::Connection("broker unreachable".to_string()));
        }
        let delay = *self.dispatch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.dispatch(descriptor, task_id, queue, priority).await
    }

    async fn enqueued_task_ids(&self, queue: &str) -> TransportResult<HashSet<String>> {
        *self.snapshot_reads.lock().unwrap() += 1;
        self.inner.enqueued_task_ids(queue).await
    }

    async fn reserved_task_ids(&self, queue: &str) -> TransportResult<HashSet<String>> {
        self.inner.reserved_task_ids(queue).await
    }

    async fn reserve(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> TransportResult<Option<ReservedTask>> {
        self.inner.reserve(queue, visibility_timeout).await
    }

    async fn ack(&self, task: &ReservedTask, outcome: TaskOutcome) -> TransportResult<()> {
        self.inner.ack(task, outcome).await
    }

    async fn restore_expired(&self, queue: &str) -> TransportResult<usize> {
        self.inner.restore_expired(queue).await
    }

    async fn stats(&self, queue: &str) -> TransportResult<QueueStats> {
        self.inner.stats(queue).await
    }
}

pub fn entity(id: i64, source: SourceType) -> SyncEntity {
    SyncEntity {
        id,
        source,
        status: EntityStatus::Active,
        access_type: AccessType::Sync,
        last_synced_at: None,
    }
}

pub fn policy(body: impl JobBody + 'static, single_flight: bool) -> SyncPolicy {
    SyncPolicy {
        sync_frequency: Duration::from_secs(3600),
        single_flight,
        body: Arc::new(body),
    }
}

/// Everything a test needs to drive and inspect one tenant.
pub struct Harness {
    pub state: AppState,
    pub store: Arc<dyn FenceStore>,
    pub queue: Arc<FlakyQueue>,
    pub sink: Arc<RecordingSink>,
    pub status: Arc<RecordingStatus>,
    pub errors: Arc<RecordingErrors>,
}

impl Harness {
    pub fn new(entities: Vec<SyncEntity>, registry: SourceRegistry) -> Self {
        let mut settings = Settings::default();
        settings.beat.tenant_id = TENANT.to_string();
        settings.runner.fence_wait_timeout = 1;
        settings.runner.poll_interval_ms = 10;
        settings.runner.idle_poll_ms = 10;
        Self::with_settings(settings, entities, registry)
    }

    pub fn with_settings(
        settings: Settings,
        entities: Vec<SyncEntity>,
        registry: SourceRegistry,
    ) -> Self {
        let store: Arc<dyn FenceStore> = Arc::new(MemoryStore::new());
        let queue = Arc::new(FlakyQueue::default());
        let sink = Arc::new(RecordingSink::default());
        let status = Arc::new(RecordingStatus::default());
        let errors = Arc::new(RecordingErrors::default());

        let state = AppState {
            settings: Arc::new(settings),
            store: store.clone(),
            queue: queue.clone(),
            registry: Arc::new(registry),
            catalog: Arc::new(FixedCatalog { entities }),
            status: status.clone(),
            sink: sink.clone(),
            errors: errors.clone(),
        };

        Self {
            state,
            store,
            queue,
            sink,
            status,
            errors,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.state.settings.queue.name
    }

    pub fn work_key(&self, entity_id: i64) -> WorkKey {
        WorkKey::new(TENANT, entity_id)
    }

    /// Asserts fence presence and index membership agree for `entity_id`.
    pub async fn assert_index_consistent(&self, entity_id: i64) {
        let key = self.work_key(entity_id);
        let fenced = self.store.exists(&key.fence_key()).await.unwrap();
        let indexed = self
            .store
            .set_members(&self.state.tenant().active_fences())
            .await
            .unwrap()
            .contains(&key.fence_key());
        assert_eq!(fenced, indexed, "fence and index disagree for {}", key);
    }
}
