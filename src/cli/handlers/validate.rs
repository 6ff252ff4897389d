//! Validate command handler
//!
//! One fence validation pass, taken under the beat lock so it never races a
//! running scheduler.

use std::time::Duration;

use crate::AppState;
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::jobs::ValidationReport;
use crate::store::StoreLock;

/// How long to wait for a running beat pass to release its lock.
const LOCK_WAIT: Duration = Duration::from_secs(10);

/// Handler for the validate command
pub struct ValidateCommandHandler {
    config: Settings,
}

impl ValidateCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(self) -> AppResult<()> {
        let state = AppState::new(self.config).await?;
        let report = validate_once(&state).await?;

        println!("✓ Validated {} fences", report.scanned);
        println!("  kept:    {}", report.kept);
        println!("  reset:   {}", report.reset);
        println!("  pruned:  {}", report.pruned);
        println!("  skipped: {}", report.skipped);
        if report.errors > 0 {
            println!("  errors:  {} (see log)", report.errors);
        }
        Ok(())
    }
}

pub(crate) async fn validate_once(state: &AppState) -> AppResult<ValidationReport> {
    let lock = StoreLock::new(
        state.store.clone(),
        state.tenant().beat_lock(),
        state.settings.beat.lock_ttl(),
    );
    if !lock.acquire(Some(LOCK_WAIT)).await? {
        return Err(AppError::BadRequest {
            message: format!(
                "Beat lock '{}' is held by a running scheduler, try again later",
                lock.name()
            ),
        });
    }

    let result = state.validator().validate_fences(&lock).await;
    lock.release_if_owned().await;

    Ok(result?)
}
