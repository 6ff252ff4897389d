//! Logger Module
//!
//! A logging system based on `tracing-subscriber` with support for:
//! - Console output with color control
//! - File output with multiple formats (Full, Compact, JSON)

pub mod config;
pub mod error;
pub(crate) mod writer;

#[cfg(test)]
mod tests;

pub use config::*;
pub use error::LoggerError;

use std::io::IsTerminal;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

/// Initialize the global subscriber with the given configuration
pub fn init_logger(config: LoggerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    build_subscriber(&config, filter)?.try_init()?;

    Ok(())
}

/// Assembles the subscriber for the enabled outputs without installing it.
pub(crate) fn build_subscriber(
    config: &LoggerConfig,
    filter: EnvFilter,
) -> anyhow::Result<BoxedSubscriber> {
    let use_ansi = config.console.colored && std::io::stdout().is_terminal();

    let subscriber = match (config.console.enabled, config.file.enabled) {
        (true, true) => with_file(&config.file, filter, Some(use_ansi))?,
        (true, false) => Box::new(
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer(use_ansi)),
        ),
        (false, true) => with_file(&config.file, filter, None)?,
        (false, false) => anyhow::bail!("At least one output (console or file) must be enabled"),
    };

    Ok(subscriber)
}

fn console_layer<S>(use_ansi: bool) -> fmt::Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(use_ansi)
        .with_target(true)
        .with_level(true)
}

/// File output, optionally followed by console output.
///
/// The file layer goes first so console ANSI settings do not leak into span
/// fields written to the file (tokio-rs/tracing#1817). Every arm builds its
/// own layers since a layer is typed by the subscriber below it.
fn with_file(
    config: &FileConfig,
    filter: EnvFilter,
    console_ansi: Option<bool>,
) -> anyhow::Result<BoxedSubscriber> {
    let writer = writer::open_log_file(config)?;
    let base = tracing_subscriber::registry().with(filter);

    let subscriber: BoxedSubscriber = match config.format {
        LogFormat::Full => {
            let layered = base.with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer),
            );
            match console_ansi {
                Some(ansi) => Box::new(layered.with(console_layer(ansi))),
                None => Box::new(layered),
            }
        }
        LogFormat::Compact => {
            let layered = base.with(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .compact()
                    .with_writer(writer),
            );
            match console_ansi {
                Some(ansi) => Box::new(layered.with(console_layer(ansi))),
                None => Box::new(layered),
            }
        }
        LogFormat::Json => {
            let layered = base.with(fmt::layer().with_ansi(false).json().with_writer(writer));
            match console_ansi {
                Some(ansi) => Box::new(layered.with(console_layer(ansi))),
                None => Box::new(layered),
            }
        }
    };

    Ok(subscriber)
}
