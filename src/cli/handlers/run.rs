//! Run command handler
//!
//! Beat and workers in one process, sharing one [`AppState`].

use crate::AppState;
use crate::config::settings::Settings;
use crate::error::AppResult;

use super::beat::start_beat;
use super::shutdown_signal;
use super::worker::run_workers;

/// Handler for the run command
pub struct RunCommandHandler {
    config: Settings,
}

impl RunCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(self) -> AppResult<()> {
        let state = AppState::new(self.config).await?;
        let service = start_beat(&state).await?;

        let workers = run_workers(&state, shutdown_signal()).await;
        let stopped = service.stop().await;

        workers?;
        stopped?;
        tracing::info!("Shutdown complete");
        Ok(())
    }
}
