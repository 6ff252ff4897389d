//! fence-rs
//!
//! Crash-recoverable background group sync: a scheduler claims each unit of
//! work with a fence in a shared store, workers run the claimed jobs, and a
//! validator resets fences whose task has disappeared.

use shadow_rs::shadow;
shadow!(build);

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logger;
pub mod queue;
pub mod services;
pub mod state;
pub mod store;

pub use state::AppState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
