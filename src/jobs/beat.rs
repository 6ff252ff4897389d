//! Periodic driver for scheduling passes, on the cron scheduler the rest of
//! the process shares.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler as TokioCronScheduler};

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::scheduler::BeatScheduler;

/// Drives [`BeatScheduler`] passes on a fixed interval
pub struct BeatService {
    scheduler: Arc<Mutex<TokioCronScheduler>>,
    beat: Arc<BeatScheduler>,
    interval: Duration,
}

impl BeatService {
    pub async fn new(beat: BeatScheduler, interval: Duration) -> JobResult<Self> {
        let scheduler = TokioCronScheduler::new()
            .await
            .map_err(|e| JobError::Scheduler(e.to_string()))?;

        Ok(Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            beat: Arc::new(beat),
            interval,
        })
    }

    /// Register the repeated pass and start ticking
    pub async fn start(&self) -> JobResult<()> {
        let beat = Arc::clone(&self.beat);

        let job = Job::new_repeated_async(self.interval, move |_uuid, _lock| {
            let beat = Arc::clone(&beat);

            Box::pin(async move {
                if let Err(e) = beat.check_for_group_sync().await {
                    tracing::error!(error = %e, "Group sync beat failed");
                }
            })
        })
        .map_err(|e| JobError::Scheduler(e.to_string()))?;

        let scheduler = self.scheduler.lock().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| JobError::Scheduler(e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| JobError::Scheduler(e.to_string()))?;

        tracing::info!(
            tenant_id = %self.beat.tenant().tenant_id(),
            interval_secs = self.interval.as_secs(),
            "Group sync beat started"
        );
        Ok(())
    }

    /// Stop the scheduler gracefully
    pub async fn stop(&self) -> JobResult<()> {
        self.scheduler
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| JobError::Scheduler(e.to_string()))?;
        Ok(())
    }
}
