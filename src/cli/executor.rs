//! Command executor for dispatching CLI commands
//!
//! Entry point for running a parsed command once configuration is loaded.

use super::handlers::{
    BeatCommandHandler, CheckCommandHandler, FencesCommandHandler, RunCommandHandler,
    ValidateCommandHandler, WorkerCommandHandler,
};
use super::parser::{Cli, Commands};
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};

/// Execute a CLI command with the given settings
///
/// # Errors
/// Returns errors from command handlers or argument validation failures
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    if let Err(reason) = cli.validate() {
        return Err(AppError::Validation {
            field: "cli_arguments".to_string(),
            reason,
        });
    }

    match cli.command_or_default() {
        Commands::Run { .. } => RunCommandHandler::new(settings).execute().await,
        Commands::Beat => BeatCommandHandler::new(settings).execute().await,
        Commands::Worker { .. } => WorkerCommandHandler::new(settings).execute().await,
        Commands::Validate => ValidateCommandHandler::new(settings).execute().await,
        Commands::Fences => FencesCommandHandler::new(settings).execute().await,
        Commands::Check => CheckCommandHandler::new(settings).execute(),
    }
}
