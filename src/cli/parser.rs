//! CLI argument parsing with clap
//!
//! Defines the command-line interface of the `fence-rs` binary.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fenced group sync scheduler and worker
#[derive(Parser, Debug)]
#[command(name = "fence-rs")]
#[command(about = "Fenced group sync scheduler and worker")]
#[command(long_about = "
fence-rs schedules periodic group sync jobs and runs them on workers. Every
unit of work is claimed with a fence in a shared store, so at most one job per
entity is in flight, and fences left behind by crashed workers are reset by a
periodic validation pass.

EXAMPLES:
    # Run the scheduler and a worker pool in one process
    fence-rs run

    # Run only the scheduler
    fence-rs beat

    # Run only workers, eight at a time
    fence-rs worker --concurrency 8

    # Use a custom configuration file
    fence-rs --config /etc/fence-rs/production.toml beat

    # Reset fences whose task is gone, once
    fence-rs validate

    # Show the active fences
    fence-rs fences

    # Check configuration without starting anything
    fence-rs check
")]
#[command(version = crate::clap_long_version())]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load this single TOML file instead of the layered files under
    /// `config/`. Environment variable overrides still apply.
    ///
    /// Example: --config /etc/fence-rs/production.toml
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects the `{environment}.toml` layer instead of `FENCE_APP_ENV`.
    ///
    /// Available values: development (dev), test, staging (stage), production (prod)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    ///
    /// Sets the log level to debug. Cannot be used with --quiet.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    ///
    /// Sets the log level to error. Cannot be used with --verbose.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the scheduler and a worker pool in one process (default)
    ///
    /// Useful with the memory backends, where the scheduler and the workers
    /// must share the process to share the store and the queue.
    Run {
        /// Number of concurrent workers
        #[arg(short = 'n', long, value_name = "N", value_parser = super::validation::validate_concurrency)]
        concurrency: Option<usize>,
    },

    /// Run the group sync scheduler until interrupted
    ///
    /// Every `beat.interval` seconds a pass claims due entities, dispatches
    /// their tasks and, outside the validation cool-down, validates fences.
    Beat,

    /// Run a worker pool until interrupted
    ///
    /// Examples:
    ///   fence-rs worker                  # Use runner.concurrency
    ///   fence-rs worker --concurrency 8  # Eight workers
    Worker {
        /// Number of concurrent workers
        #[arg(short = 'n', long, value_name = "N", value_parser = super::validation::validate_concurrency)]
        concurrency: Option<usize>,
    },

    /// Run one fence validation pass and exit
    Validate,

    /// List the active fence index with each fence record
    Fences,

    /// Validate configuration and exit
    ///
    /// Returns exit code 0 if valid, non-zero if invalid.
    Check,
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

impl Cli {
    /// The command to run; `run` when none was given.
    pub fn command_or_default(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Run { concurrency: None })
    }

    /// Checks argument combinations clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        Ok(())
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}
