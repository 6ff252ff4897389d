//! Scenario tests for the claim, run and validate protocol.

use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use tokio_util::sync::CancellationToken;

use crate::jobs::testing::*;
use crate::jobs::{
    FenceRecord, FenceVerdict, GROUP_SYNC_TASK, JobError, RunOutcome, SourceRegistry, SourceType,
    SyncFence,
};
use crate::queue::{JobDescriptor, QueueTransport, TaskEnvelope, TaskPriority};
use crate::services::SyncStatus;
use crate::store::{FenceStore, StoreLock};

fn registry(body: impl crate::jobs::JobBody + 'static) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register(SourceType::Confluence, policy(body, false));
    registry
}

fn envelope(harness: &Harness, entity_id: i64, task_id: &str) -> TaskEnvelope {
    TaskEnvelope {
        task_id: task_id.to_string(),
        queue: harness.queue_name().to_string(),
        priority: TaskPriority::Medium,
        descriptor: JobDescriptor {
            task_name: GROUP_SYNC_TASK.to_string(),
            tenant_id: TENANT.to_string(),
            entity_id,
        },
        enqueued_at: Timestamp::now(),
    }
}

fn fence(harness: &Harness, entity_id: i64) -> SyncFence {
    SyncFence::new(harness.store.clone(), harness.work_key(entity_id))
}

async fn beat_lock(harness: &Harness) -> StoreLock {
    let lock = StoreLock::new(
        harness.store.clone(),
        harness.state.tenant().beat_lock(),
        Duration::from_secs(60),
    );
    assert!(lock.acquire(None).await.unwrap());
    lock
}

#[tokio::test]
async fn claim_writes_fence_index_and_task() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(1)));
    let scheduler = harness.state.beat_scheduler();

    let payload_id = scheduler
        .try_creating_sync_task(&entity(1, SourceType::Confluence))
        .await
        .expect("claim should succeed");

    let record = fence(&harness, 1).payload().await.unwrap().unwrap();
    assert_eq!(record.id, payload_id);
    let task_id = record.task_id.expect("task id written after dispatch");
    assert!(task_id.starts_with("t1:groupsync_taskset_1_"));

    let enqueued = harness.queue.enqueued_task_ids(harness.queue_name()).await.unwrap();
    assert!(enqueued.contains(&task_id));
    assert!(fence(&harness, 1).taskset_members().await.unwrap().contains(&task_id));
    assert_eq!(harness.status.starts(), vec![1]);
    harness.assert_index_consistent(1).await;
}

#[tokio::test]
async fn existing_fence_blocks_a_second_claim() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(1)));
    let scheduler = harness.state.beat_scheduler();
    let target = entity(1, SourceType::Confluence);

    assert!(scheduler.try_creating_sync_task(&target).await.is_some());
    assert!(scheduler.try_creating_sync_task(&target).await.is_none());

    assert_eq!(harness.queue.enqueued_task_ids(harness.queue_name()).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_dispatch_exactly_one_task() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(1)));
    let scheduler = Arc::new(harness.state.beat_scheduler());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let scheduler = Arc::clone(&scheduler);
        handles.push(tokio::spawn(async move {
            scheduler
                .try_creating_sync_task(&entity(1, SourceType::Confluence))
                .await
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(payload_id) = handle.await.unwrap() {
            claimed.push(payload_id);
        }
    }

    assert_eq!(claimed.len(), 1);
    assert_eq!(harness.queue.enqueued_task_ids(harness.queue_name()).await.unwrap().len(), 1);
    let record = fence(&harness, 1).payload().await.unwrap().unwrap();
    assert_eq!(record.id, claimed[0]);
    harness.assert_index_consistent(1).await;

    // Losing claimers must not wipe the winner's side state.
    let task_id = record.task_id.unwrap();
    assert_eq!(
        fence(&harness, 1).taskset_members().await.unwrap(),
        std::collections::HashSet::from([task_id])
    );
    assert!(fence(&harness, 1).active().await.unwrap());
}

#[tokio::test]
async fn dispatch_failure_resets_the_fence() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(1)));
    *harness.queue.fail_dispatch.lock().unwrap() = true;

    let claimed = harness
        .state
        .beat_scheduler()
        .try_creating_sync_task(&entity(1, SourceType::Confluence))
        .await;

    assert!(claimed.is_none());
    assert!(!fence(&harness, 1).fenced().await.unwrap());
    harness.assert_index_consistent(1).await;
}

#[tokio::test]
async fn full_run_flushes_in_batches_and_clears_the_fence() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(250)));
    harness
        .state
        .beat_scheduler()
        .try_creating_sync_task(&entity(1, SourceType::Confluence))
        .await
        .unwrap();

    let pool = harness.state.worker_pool(1);
    assert!(pool.process_next().await.unwrap());

    assert_eq!(harness.sink.batches(), vec![100, 100, 50]);
    assert_eq!(harness.sink.marked(), 1);
    assert_eq!(harness.sink.removed(), 1);
    assert_eq!(harness.status.results(), vec![(1, SyncStatus::Success)]);
    assert!(!fence(&harness, 1).fenced().await.unwrap());
    harness.assert_index_consistent(1).await;

    let stats = harness.queue.stats(harness.queue_name()).await.unwrap();
    assert_eq!(stats.succeeded, 1);
    assert!(!pool.process_next().await.unwrap());
}

#[tokio::test]
async fn empty_body_still_removes_stale_groups() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(0)));
    harness
        .state
        .beat_scheduler()
        .try_creating_sync_task(&entity(1, SourceType::Confluence))
        .await
        .unwrap();

    assert!(harness.state.worker_pool(1).process_next().await.unwrap());

    assert!(harness.sink.batches().is_empty());
    assert_eq!(harness.sink.removed(), 1);
    assert_eq!(harness.status.results(), vec![(1, SyncStatus::Success)]);
}

#[tokio::test]
async fn body_failure_reports_and_still_clears_the_fence() {
    let harness = Harness::new(
        vec![entity(1, SourceType::Confluence)],
        registry(VecBody::failing_after(5)),
    );
    harness
        .state
        .beat_scheduler()
        .try_creating_sync_task(&entity(1, SourceType::Confluence))
        .await
        .unwrap();

    assert!(harness.state.worker_pool(1).process_next().await.unwrap());

    let fence = fence(&harness, 1);
    assert!(!fence.fenced().await.unwrap());
    assert_eq!(fence.generator_progress().await.unwrap(), None);
    assert!(fence.taskset_members().await.unwrap().is_empty());
    assert_eq!(harness.status.results(), vec![(1, SyncStatus::Failed)]);
    assert_eq!(harness.sink.removed(), 0);

    let events = harness.errors.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, Some(1));

    let stats = harness.queue.stats(harness.queue_name()).await.unwrap();
    assert_eq!(stats.failed, 1);
    harness.assert_index_consistent(1).await;
}

#[tokio::test]
async fn missing_entity_is_a_reported_failure() {
    let harness = Harness::new(Vec::new(), registry(VecBody::new(3)));
    harness
        .state
        .beat_scheduler()
        .try_creating_sync_task(&entity(4, SourceType::Confluence))
        .await
        .unwrap();

    let task = harness
        .queue
        .reserve(harness.queue_name(), Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();
    let result = harness
        .state
        .runner()
        .execute(&task.envelope, CancellationToken::new())
        .await;

    assert!(matches!(result, Err(JobError::EntityNotFound(4))));
    assert!(!fence(&harness, 4).fenced().await.unwrap());
    assert_eq!(harness.errors.events().len(), 1);
}

#[tokio::test]
async fn cancellation_ends_the_run_gracefully() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(PendingBody));
    harness
        .state
        .beat_scheduler()
        .try_creating_sync_task(&entity(1, SourceType::Confluence))
        .await
        .unwrap();
    let task = harness
        .queue
        .reserve(harness.queue_name(), Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = harness
        .state
        .runner()
        .execute(&task.envelope, cancel)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::TimedOut);
    assert!(!fence(&harness, 1).fenced().await.unwrap());
    assert_eq!(harness.status.results(), vec![(1, SyncStatus::Failed)]);
    assert!(harness.errors.events().is_empty());
}

#[tokio::test]
async fn soft_time_limit_ends_the_run_gracefully() {
    let mut settings = crate::config::Settings::default();
    settings.beat.tenant_id = TENANT.to_string();
    settings.runner.soft_time_limit = 1;
    let harness = Harness::with_settings(
        settings,
        vec![entity(1, SourceType::Confluence)],
        registry(PendingBody),
    );
    harness
        .state
        .beat_scheduler()
        .try_creating_sync_task(&entity(1, SourceType::Confluence))
        .await
        .unwrap();

    assert!(harness.state.worker_pool(1).process_next().await.unwrap());

    assert!(!fence(&harness, 1).fenced().await.unwrap());
    assert_eq!(harness.status.results(), vec![(1, SyncStatus::Failed)]);
}

#[tokio::test]
async fn lock_contention_leaves_the_fence_alone() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(3)));
    harness
        .state
        .beat_scheduler()
        .try_creating_sync_task(&entity(1, SourceType::Confluence))
        .await
        .unwrap();
    let task = harness
        .queue
        .reserve(harness.queue_name(), Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();

    let holder = StoreLock::new(
        harness.store.clone(),
        harness.work_key(1).lock_key(),
        Duration::from_secs(60),
    );
    assert!(holder.acquire(None).await.unwrap());

    let outcome = harness
        .state
        .runner()
        .execute(&task.envelope, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::LockContended);
    let record = fence(&harness, 1).payload().await.unwrap().unwrap();
    assert_eq!(record.started_at, None);
    assert!(harness.status.results().is_empty());
    assert!(harness.errors.events().is_empty());
    assert!(holder.owned().await.unwrap());
}

#[tokio::test]
async fn runner_waits_for_the_task_id_to_be_written() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(3)));
    let fence = fence(&harness, 1);
    let mut record = FenceRecord::new();
    assert!(fence.create(&record).await.unwrap());

    let runner = harness.state.runner();
    let delivered = envelope(&harness, 1, "task-late");
    let writer = {
        let fence = fence.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            record.task_id = Some("task-late".to_string());
            fence.update(&record).await.unwrap();
        }
    };

    let (outcome, ()) = tokio::join!(runner.execute(&delivered, CancellationToken::new()), writer);

    assert_eq!(outcome.unwrap(), RunOutcome::Succeeded { items: 3 });
    assert_eq!(harness.sink.batches(), vec![3]);
    assert_eq!(harness.status.results(), vec![(1, SyncStatus::Success)]);
    assert!(harness.errors.events().is_empty());
    assert!(!fence.fenced().await.unwrap());
}

#[tokio::test]
async fn unfinished_fence_times_out_and_is_reset() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(3)));
    let fence = fence(&harness, 1);
    assert!(fence.create(&FenceRecord::new()).await.unwrap());

    let result = harness
        .state
        .runner()
        .execute(&envelope(&harness, 1, "task-1"), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(JobError::FenceWaitTimedOut { .. })));
    assert!(!fence.fenced().await.unwrap());
    assert_eq!(harness.errors.events().len(), 1);
    assert!(harness.sink.batches().is_empty());
    harness.assert_index_consistent(1).await;
}

#[tokio::test]
async fn missing_fence_fails_immediately() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(3)));

    let result = harness
        .state
        .runner()
        .execute(&envelope(&harness, 1, "task-1"), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(JobError::FenceNotFound { .. })));
    assert_eq!(harness.errors.events().len(), 1);
    assert!(harness.status.results().is_empty());
}

#[tokio::test]
async fn stale_delivery_does_not_touch_a_newer_fence() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(3)));
    let fence = fence(&harness, 1);
    let mut record = FenceRecord::new();
    record.task_id = Some("task-new".to_string());
    assert!(fence.create(&record).await.unwrap());

    let outcome = harness
        .state
        .runner()
        .execute(&envelope(&harness, 1, "task-old"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Superseded);
    assert_eq!(fence.payload().await.unwrap(), Some(record));
    assert!(harness.sink.batches().is_empty());
}

#[tokio::test]
async fn validator_resets_fence_whose_task_vanished() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(3)));
    harness
        .state
        .beat_scheduler()
        .try_creating_sync_task(&entity(1, SourceType::Confluence))
        .await
        .unwrap();
    let task_id = fence(&harness, 1).payload().await.unwrap().unwrap().task_id.unwrap();
    assert!(harness.queue.inner.discard(harness.queue_name(), &task_id).unwrap());

    let lock = beat_lock(&harness).await;
    let report = harness.state.validator().validate_fences(&lock).await.unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.reset, 1);
    assert!(!fence(&harness, 1).fenced().await.unwrap());
    assert!(
        harness
            .store
            .set_members(&harness.state.tenant().active_fences())
            .await
            .unwrap()
            .is_empty()
    );

    let events = harness.errors.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].0.contains(&task_id));
    assert_eq!(events[0].1, Some(1));
}

#[tokio::test]
async fn validator_keeps_enqueued_reserved_and_pending_fences() {
    let entities = vec![
        entity(1, SourceType::Confluence),
        entity(2, SourceType::Confluence),
    ];
    let harness = Harness::new(entities.clone(), registry(VecBody::new(1)));
    let scheduler = harness.state.beat_scheduler();
    for target in &entities {
        scheduler.try_creating_sync_task(target).await.unwrap();
    }
    // Entity 1 moves to a worker, entity 2 stays queued.
    let reserved = harness
        .queue
        .reserve(harness.queue_name(), Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reserved.envelope.descriptor.entity_id, 1);

    assert!(fence(&harness, 3).create(&FenceRecord::new()).await.unwrap());

    let validator = harness.state.validator();
    let snapshot = validator.snapshot().await.unwrap();
    assert_eq!(
        validator.validate_fence(&harness.work_key(1).fence_key(), &snapshot).await.unwrap(),
        FenceVerdict::Reserved
    );
    assert_eq!(
        validator.validate_fence(&harness.work_key(2).fence_key(), &snapshot).await.unwrap(),
        FenceVerdict::Enqueued
    );
    assert_eq!(
        validator.validate_fence(&harness.work_key(3).fence_key(), &snapshot).await.unwrap(),
        FenceVerdict::Pending
    );
    assert!(harness.errors.events().is_empty());
}

#[tokio::test]
async fn validator_resets_corrupt_and_prunes_orphaned_entries() {
    let harness = Harness::new(Vec::new(), registry(VecBody::new(1)));
    let index = harness.state.tenant().active_fences();
    let corrupt = harness.work_key(1).fence_key();
    let orphan = harness.work_key(2).fence_key();

    harness
        .store
        .set(&corrupt, r#"{"legacy":true}"#.to_string(), None)
        .await
        .unwrap();
    harness.store.add_to_set(&index, &corrupt).await.unwrap();
    harness.store.add_to_set(&index, &orphan).await.unwrap();
    harness
        .store
        .add_to_set(&index, "t1:connectorpermissions_fence_9")
        .await
        .unwrap();

    let lock = beat_lock(&harness).await;
    let report = harness.state.validator().validate_fences(&lock).await.unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.reset, 1);
    assert_eq!(report.pruned, 1);
    let members = harness.store.set_members(&index).await.unwrap();
    assert_eq!(members.len(), 1);
    assert!(members.contains("t1:connectorpermissions_fence_9"));
    assert!(!harness.store.exists(&corrupt).await.unwrap());
}

#[tokio::test]
async fn active_signal_bridges_when_enabled() {
    let mut settings = crate::config::Settings::default();
    settings.beat.tenant_id = TENANT.to_string();
    settings.validator.honor_active_signal = true;
    let harness = Harness::with_settings(
        settings,
        vec![entity(1, SourceType::Confluence)],
        registry(VecBody::new(1)),
    );
    harness
        .state
        .beat_scheduler()
        .try_creating_sync_task(&entity(1, SourceType::Confluence))
        .await
        .unwrap();
    let task_id = fence(&harness, 1).payload().await.unwrap().unwrap().task_id.unwrap();
    harness.queue.inner.discard(harness.queue_name(), &task_id).unwrap();

    let validator = harness.state.validator();
    let fence_key = harness.work_key(1).fence_key();
    let snapshot = validator.snapshot().await.unwrap();
    assert_eq!(
        validator.validate_fence(&fence_key, &snapshot).await.unwrap(),
        FenceVerdict::Bridged
    );

    harness.store.delete(&harness.work_key(1).active_key()).await.unwrap();
    assert_eq!(
        validator.validate_fence(&fence_key, &snapshot).await.unwrap(),
        FenceVerdict::Reset
    );
}

#[tokio::test]
async fn single_flight_source_keeps_lowest_id_every_pass() {
    let mut registry = SourceRegistry::new();
    registry.register(SourceType::Confluence, policy(VecBody::new(1), true));
    let harness = Harness::new(
        vec![
            entity(7, SourceType::Confluence),
            entity(3, SourceType::Confluence),
            entity(9, SourceType::Confluence),
        ],
        registry,
    );
    let scheduler = harness.state.beat_scheduler();

    for _ in 0..3 {
        let due: Vec<i64> = scheduler
            .due_entities()
            .await
            .unwrap()
            .iter()
            .map(|entity| entity.id)
            .collect();
        assert_eq!(due, vec![3]);
    }

    let report = scheduler.check_for_group_sync().await.unwrap().unwrap();
    assert_eq!(report.dispatched, vec![3]);
}

#[tokio::test]
async fn beat_skips_ineligible_and_recently_synced_entities() {
    let mut recent = entity(2, SourceType::Confluence);
    recent.last_synced_at = Some(Timestamp::now());
    let mut deleting = entity(3, SourceType::Confluence);
    deleting.status = crate::jobs::EntityStatus::Deleting;
    let no_policy = entity(4, SourceType::Slack);

    let harness = Harness::new(
        vec![entity(1, SourceType::Confluence), recent, deleting, no_policy],
        registry(VecBody::new(1)),
    );

    let report = harness
        .state
        .beat_scheduler()
        .check_for_group_sync()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.due, 1);
    assert_eq!(report.dispatched, vec![1]);
    assert!(!report.timed_out);
}

#[tokio::test]
async fn beat_lock_held_elsewhere_skips_the_pass() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(1)));
    let _held = beat_lock(&harness).await;

    let report = harness.state.beat_scheduler().check_for_group_sync().await.unwrap();

    assert!(report.is_none());
    assert!(!fence(&harness, 1).fenced().await.unwrap());
    assert!(harness.status.starts().is_empty());
}

#[tokio::test]
async fn beat_releases_its_lock_and_respects_validation_cooldown() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(1)));
    let scheduler = harness.state.beat_scheduler();

    let first = scheduler.check_for_group_sync().await.unwrap().unwrap();
    assert!(first.validation.is_some());
    assert!(
        harness
            .store
            .exists(&harness.state.tenant().block_validate())
            .await
            .unwrap()
    );

    let second = scheduler.check_for_group_sync().await.unwrap().unwrap();
    assert!(second.validation.is_none());
    assert!(second.dispatched.is_empty());

    assert!(beat_lock(&harness).await.owned().await.unwrap());
}

#[tokio::test]
async fn worker_pool_drains_the_queue_until_shutdown() {
    let entities = vec![
        entity(1, SourceType::Confluence),
        entity(2, SourceType::Confluence),
    ];
    let harness = Harness::new(entities, registry(VecBody::new(120)));
    let report = harness
        .state
        .beat_scheduler()
        .check_for_group_sync()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.dispatched, vec![1, 2]);

    let pool = harness.state.worker_pool(2);
    let shutdown = pool.shutdown_token();
    let running = tokio::spawn(async move { pool.run().await });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while harness.status.results().len() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    shutdown.cancel();
    running.await.unwrap();

    let mut results = harness.status.results();
    results.sort_by_key(|(id, _)| *id);
    assert_eq!(
        results,
        vec![(1, SyncStatus::Success), (2, SyncStatus::Success)]
    );
    let mut batches = harness.sink.batches();
    batches.sort_unstable();
    assert_eq!(batches, vec![20, 20, 100, 100]);
    assert!(!fence(&harness, 1).fenced().await.unwrap());
    assert!(!fence(&harness, 2).fenced().await.unwrap());
}

#[tokio::test]
async fn slow_dispatch_past_the_deadline_still_finishes_its_claim() {
    let mut settings = crate::config::Settings::default();
    settings.beat.tenant_id = TENANT.to_string();
    settings.beat.soft_time_limit = 1;
    let harness = Harness::with_settings(
        settings,
        vec![entity(1, SourceType::Confluence), entity(2, SourceType::Confluence)],
        registry(VecBody::new(1)),
    );
    *harness.queue.dispatch_delay.lock().unwrap() = Some(Duration::from_millis(1200));

    let report = harness
        .state
        .beat_scheduler()
        .check_for_group_sync()
        .await
        .unwrap()
        .unwrap();

    assert!(report.timed_out);
    assert_eq!(report.dispatched, vec![1]);
    assert!(report.validation.is_none());

    let record = fence(&harness, 1).payload().await.unwrap().unwrap();
    assert!(record.task_id.is_some());
    assert!(!fence(&harness, 2).fenced().await.unwrap());
    harness.assert_index_consistent(1).await;
    harness.assert_index_consistent(2).await;
}

#[tokio::test]
async fn validator_resets_a_fence_abandoned_before_dispatch() {
    let harness = Harness::new(vec![entity(1, SourceType::Confluence)], registry(VecBody::new(1)));
    let stale = FenceRecord {
        submitted_at: Timestamp::now() - jiff::SignedDuration::from_secs(5),
        ..FenceRecord::new()
    };
    assert!(fence(&harness, 1).create(&stale).await.unwrap());

    let lock = beat_lock(&harness).await;
    let report = harness.state.validator().validate_fences(&lock).await.unwrap();

    assert_eq!(report.reset, 1);
    assert!(!fence(&harness, 1).fenced().await.unwrap());
    harness.assert_index_consistent(1).await;
    let events = harness.errors.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].0.contains(&stale.id));

    assert!(
        harness
            .state
            .beat_scheduler()
            .try_creating_sync_task(&entity(1, SourceType::Confluence))
            .await
            .is_some()
    );
}

#[tokio::test]
async fn validation_reads_the_queue_once_per_pass() {
    let entities: Vec<_> = (1..=3).map(|id| entity(id, SourceType::Confluence)).collect();
    let harness = Harness::new(entities.clone(), registry(VecBody::new(1)));
    let scheduler = harness.state.beat_scheduler();
    for target in &entities {
        scheduler.try_creating_sync_task(target).await.unwrap();
    }
    *harness.queue.snapshot_reads.lock().unwrap() = 0;

    let lock = beat_lock(&harness).await;
    let report = harness.state.validator().validate_fences(&lock).await.unwrap();

    assert_eq!(report.kept, 3);
    assert_eq!(harness.queue.snapshot_reads(), 1);
}

#[tokio::test]
async fn single_flight_success_marks_the_whole_source_synced() {
    let mut registry = SourceRegistry::new();
    registry.register(SourceType::Confluence, policy(VecBody::new(2), true));
    registry.register(SourceType::Jira, policy(VecBody::new(2), false));
    let harness = Harness::new(
        vec![
            entity(9, SourceType::Confluence),
            entity(3, SourceType::Confluence),
            entity(7, SourceType::Confluence),
            entity(4, SourceType::Jira),
        ],
        registry,
    );
    let scheduler = harness.state.beat_scheduler();
    scheduler
        .try_creating_sync_task(&entity(3, SourceType::Confluence))
        .await
        .unwrap();
    scheduler
        .try_creating_sync_task(&entity(4, SourceType::Jira))
        .await
        .unwrap();

    let pool = harness.state.worker_pool(1);
    assert!(pool.process_next().await.unwrap());
    assert!(pool.process_next().await.unwrap());

    let mut results = harness.status.results();
    results.sort_by_key(|(id, _)| *id);
    assert_eq!(results, vec![(3, SyncStatus::Success), (4, SyncStatus::Success)]);

    let mut synced = harness.status.synced();
    synced.sort();
    assert_eq!(synced, vec![7, 9]);
}
