//! Errors raised while loading and checking settings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// A setting is present but out of range or inconsistent with another.
    #[error("Validation error: {field} - {message}")]
    ValidationError { field: String, message: String },

    #[error("Environment variable error: {0}")]
    EnvVarError(String),

    /// `FENCE_CONFIG_DIR` and `FENCE_CONFIG_FILE` were both set.
    #[error("Mutual exclusivity error: {0}")]
    MutualExclusivityError(String),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ConfigError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn file_not_found<S: Into<String>>(path: S) -> Self {
        ConfigError::FileNotFound(path.into())
    }

    pub fn mutual_exclusivity<S: Into<String>>(message: S) -> Self {
        ConfigError::MutualExclusivityError(message.into())
    }

    /// Short name of what went wrong, used as the error key at the
    /// application boundary.
    pub fn key(&self) -> &str {
        match self {
            ConfigError::FileNotFound(_) => "file",
            ConfigError::ParseError(_) | ConfigError::Other(_) => "parse",
            ConfigError::ValidationError { field, .. } => field,
            ConfigError::EnvVarError(_) => "environment",
            ConfigError::MutualExclusivityError(_) => "source",
        }
    }
}
