//! Configuration validation logic
//!
//! Validation methods for every configuration section, run once after the
//! layers are merged.

use std::collections::HashSet;

use crate::config::error::ConfigError;
use crate::config::settings::{
    BeatConfig, FileSettings, LoggerSettings, QueueBackend, QueueConfig, RedisConfig,
    RunnerConfig, Settings, StoreBackend, StoreConfig, ValidatorConfig,
};

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

/// Valid redis url schemes
const VALID_REDIS_SCHEMES: &[&str] = &["redis://", "rediss://", "redis+unix://", "unix://"];

fn positive(value: u64, field: &str, what: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ValidationError {
            field: field.to_string(),
            message: format!("{} must be greater than 0.", what),
        });
    }
    Ok(())
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// Validate logger settings
    ///
    /// # Validation Rules
    /// - Log level must be one of: trace, debug, info, warn, error
    /// - If file logging is enabled, path must not be empty
    /// - Log format must be one of: full, compact, json
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        self.file.validate()
    }
}

impl RedisConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if !VALID_REDIS_SCHEMES
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
        {
            return Err(ConfigError::ValidationError {
                field: format!("{}.redis.url", section),
                message: format!(
                    "Invalid redis URL '{}'. Expected one of: {}",
                    self.url,
                    VALID_REDIS_SCHEMES.join(", ")
                ),
            });
        }

        if self.pool_size == 0 {
            return Err(ConfigError::ValidationError {
                field: format!("{}.redis.pool_size", section),
                message: "Pool size must be greater than 0.".to_string(),
            });
        }

        Ok(())
    }
}

impl StoreConfig {
    /// Redis settings are only checked when the redis backend is selected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            StoreBackend::Memory => Ok(()),
            StoreBackend::Redis => self.redis.validate("store"),
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::validation("queue.name", "Queue name is required."));
        }
        positive(self.visibility_timeout, "queue.visibility_timeout", "Visibility timeout")?;

        match self.backend {
            QueueBackend::Memory => Ok(()),
            QueueBackend::Redis => self.redis.validate("queue"),
        }
    }
}

impl BeatConfig {
    /// Validate scheduler settings
    ///
    /// # Validation Rules
    /// - Tenant id must not be empty or contain ':'
    /// - Interval, lock timeout and soft time limit must be greater than 0
    /// - The beat lock must outlive one interval
    /// - Beat multiplier must be at least 1
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant_id.trim().is_empty() || self.tenant_id.contains(':') {
            return Err(ConfigError::validation(
                "beat.tenant_id",
                "Tenant id must be non-empty and must not contain ':'.",
            ));
        }

        positive(self.interval, "beat.interval", "Beat interval")?;
        positive(self.lock_timeout, "beat.lock_timeout", "Beat lock timeout")?;
        positive(self.soft_time_limit, "beat.soft_time_limit", "Soft time limit")?;

        if self.lock_timeout <= self.interval {
            return Err(ConfigError::ValidationError {
                field: "beat.lock_timeout".to_string(),
                message: format!(
                    "Beat lock timeout ({}s) must be longer than the beat interval ({}s).",
                    self.lock_timeout, self.interval
                ),
            });
        }

        if !self.beat_multiplier.is_finite() || self.beat_multiplier < 1.0 {
            return Err(ConfigError::validation(
                "beat.beat_multiplier",
                "Beat multiplier must be a finite number of at least 1.",
            ));
        }

        Ok(())
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive(self.fence_wait_timeout, "runner.fence_wait_timeout", "Fence wait timeout")?;
        positive(self.poll_interval_ms, "runner.poll_interval_ms", "Poll interval")?;
        positive(self.lock_timeout, "runner.lock_timeout", "Execution lock timeout")?;
        positive(self.batch_size as u64, "runner.batch_size", "Batch size")?;
        positive(self.soft_time_limit, "runner.soft_time_limit", "Soft time limit")?;
        positive(self.concurrency as u64, "runner.concurrency", "Concurrency")?;
        positive(self.idle_poll_ms, "runner.idle_poll_ms", "Idle poll interval")?;

        if self.poll_interval() >= self.fence_wait_timeout() {
            return Err(ConfigError::ValidationError {
                field: "runner.poll_interval_ms".to_string(),
                message: format!(
                    "Poll interval ({}ms) must be shorter than the fence wait timeout ({}s).",
                    self.poll_interval_ms, self.fence_wait_timeout
                ),
            });
        }

        if self.lock_ttl() < self.poll_interval() {
            return Err(ConfigError::validation(
                "runner.lock_timeout",
                "Execution lock timeout must not be shorter than the poll interval.",
            ));
        }

        Ok(())
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive(self.active_signal_ttl, "validator.active_signal_ttl", "Active signal TTL")
    }
}

impl Settings {
    /// Validate all configuration settings
    ///
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logger.validate()?;
        self.store.validate()?;
        self.queue.validate()?;
        self.beat.validate()?;
        self.runner.validate()?;
        self.validator.validate()?;

        // A reservation must outlive the longest run, or a live task drops out
        // of the reserved view and is both reset and redelivered.
        let longest_run = self.runner.fence_wait_timeout + self.runner.soft_time_limit;
        if longest_run >= self.queue.visibility_timeout {
            return Err(ConfigError::ValidationError {
                field: "queue.visibility_timeout".to_string(),
                message: format!(
                    "Visibility timeout ({}s) must exceed the fence wait timeout plus the runner soft time limit ({}s).",
                    self.queue.visibility_timeout, longest_run
                ),
            });
        }

        let mut sources = HashSet::new();
        for source in &self.sources {
            if !sources.insert(source.source) {
                return Err(ConfigError::ValidationError {
                    field: "sources".to_string(),
                    message: format!("Source '{}' is configured more than once.", source.source),
                });
            }
            positive(source.sync_frequency, "sources.sync_frequency", "Sync frequency")?;
        }

        let mut entities = HashSet::new();
        for entity in &self.entities {
            if !entities.insert(entity.id) {
                return Err(ConfigError::ValidationError {
                    field: "entities".to_string(),
                    message: format!("Entity id {} is configured more than once.", entity.id),
                });
            }
        }

        Ok(())
    }
}
