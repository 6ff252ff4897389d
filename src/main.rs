use clap::Parser;

use fence_rs::cli::{Cli, execute_command, init_logger_from_settings, load_and_merge_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = load_and_merge_config(&cli)?;
    init_logger_from_settings(&settings)?;

    tracing::info!(
        app = %settings.application.name,
        version = fence_rs::pkg_version(),
        tenant_id = %settings.beat.tenant_id,
        "Starting"
    );

    execute_command(&cli, settings).await?;
    Ok(())
}
