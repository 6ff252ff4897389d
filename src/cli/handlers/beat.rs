//! Beat command handler
//!
//! Runs the group sync scheduler on its interval until shutdown.

use crate::AppState;
use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::jobs::BeatService;

use super::shutdown_signal;

/// Handler for the beat command
pub struct BeatCommandHandler {
    config: Settings,
}

impl BeatCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(self) -> AppResult<()> {
        let state = AppState::new(self.config).await?;
        let service = start_beat(&state).await?;

        shutdown_signal().await;

        service.stop().await?;
        tracing::info!("Beat shutdown complete");
        Ok(())
    }
}

/// Starts the periodic scheduler for the state's tenant.
pub(crate) async fn start_beat(state: &AppState) -> AppResult<BeatService> {
    let service = BeatService::new(state.beat_scheduler(), state.settings.beat.interval()).await?;
    service.start().await?;
    Ok(service)
}
