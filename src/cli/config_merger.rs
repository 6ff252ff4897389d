//! Configuration merger for CLI arguments and config files
//!
//! CLI arguments override values loaded from files and environment variables.

use std::path::Path;

use super::parser::{Cli, Commands};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, Environment, settings::Settings};

/// Applies CLI overrides on top of file-based configuration
pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Load the base configuration from `config_path`, or from the layered
    /// loader when no path is given.
    ///
    /// Validation is deferred to [`ConfigurationMerger::merge_cli_args`], so
    /// an override can repair a value the files got wrong.
    pub fn from_config_path(
        config_path: Option<&Path>,
        environment: Option<Environment>,
    ) -> Result<Self, ConfigError> {
        let loader = match (config_path, environment) {
            (Some(path), env) => {
                ConfigLoader::with_file(path, env.unwrap_or_else(Environment::from_env))
            }
            (None, Some(env)) => {
                let loader = ConfigLoader::new()?;
                match loader.config_file() {
                    Some(file) => ConfigLoader::with_file(file, env),
                    None => ConfigLoader::with_dir(loader.config_dir(), env),
                }
            }
            (None, None) => ConfigLoader::new()?,
        };

        Ok(Self::new(loader.load_unvalidated()?))
    }

    /// Merge CLI arguments into the base configuration and validate the
    /// result.
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }

        match cli.command_or_default() {
            Commands::Run {
                concurrency: Some(concurrency),
            }
            | Commands::Worker {
                concurrency: Some(concurrency),
            } => {
                config.runner.concurrency = concurrency;
            }
            _ => {}
        }

        config.validate()?;

        Ok(config)
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }
}
