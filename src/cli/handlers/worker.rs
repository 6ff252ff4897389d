//! Worker command handler

use std::future::Future;

use crate::AppState;
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};

use super::shutdown_signal;

/// Handler for the worker command
pub struct WorkerCommandHandler {
    config: Settings,
}

impl WorkerCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(self) -> AppResult<()> {
        let state = AppState::new(self.config).await?;
        run_workers(&state, shutdown_signal()).await
    }
}

/// Runs `runner.concurrency` workers until `shutdown` resolves, then waits
/// for in-flight tasks to finish.
pub(crate) async fn run_workers(
    state: &AppState,
    shutdown: impl Future<Output = ()>,
) -> AppResult<()> {
    let pool = state.worker_pool(state.settings.runner.concurrency);
    let token = pool.shutdown_token();
    let running = tokio::spawn(async move { pool.run().await });

    shutdown.await;
    token.cancel();

    running.await.map_err(|e| AppError::Internal {
        source: anyhow::Error::from(e),
    })?;
    tracing::info!("Worker shutdown complete");
    Ok(())
}
