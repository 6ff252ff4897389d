//! Command handlers for CLI operations
//!
//! One handler per subcommand, separating command execution from parsing
//! and validation.

pub mod beat;
pub mod check;
pub mod fences;
pub mod run;
pub mod validate;
pub mod worker;

pub use beat::BeatCommandHandler;
pub use check::CheckCommandHandler;
pub use fences::FencesCommandHandler;
pub use run::RunCommandHandler;
pub use validate::ValidateCommandHandler;
pub use worker::WorkerCommandHandler;

use tokio::signal;

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
///
/// A signal whose handler cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
