//! Check command handler
//!
//! Validates configuration and prints what a process would run with.

use crate::config::settings::Settings;
use crate::error::AppResult;

/// Handler for the check command
pub struct CheckCommandHandler {
    config: Settings,
}

impl CheckCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> AppResult<()> {
        self.config.validate()?;

        let config = &self.config;
        println!("✓ Configuration is valid");
        println!("✓ Tenant: {}", config.beat.tenant_id);
        println!("✓ Store backend: {:?}", config.store.backend);
        println!(
            "✓ Queue backend: {:?} (queue '{}', priority {})",
            config.queue.backend, config.queue.name, config.queue.priority
        );
        println!(
            "✓ Beat every {}s, validation cool-down {}s",
            config.beat.interval,
            config.beat.validation_cooldown().as_secs()
        );

        let synced: Vec<&str> = config
            .sources
            .iter()
            .filter(|source| source.directory_url.is_some())
            .map(|source| source.source.as_str())
            .collect();
        println!(
            "✓ {} sources configured, {} with a directory: [{}]",
            config.sources.len(),
            synced.len(),
            synced.join(", ")
        );
        println!("✓ {} entities configured", config.entities.len());
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
