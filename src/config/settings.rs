//! Configuration settings structures for fence-rs
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables. Durations are whole seconds unless
//! the field name says otherwise.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::jobs::{AccessType, EntityStatus, SourceType};
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};
use crate::queue::TaskPriority;

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "fence-rs".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/fence.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_pool_size() -> u32 {
    4
}

fn default_redis_connection_timeout() -> u64 {
    5
}

fn default_redis_key_prefix() -> String {
    "fence".to_string()
}

fn default_queue_name() -> String {
    "group_sync".to_string()
}

fn default_visibility_timeout() -> u64 {
    4 * 60 * 60
}

fn default_tenant_id() -> String {
    "public".to_string()
}

fn default_beat_interval() -> u64 {
    20
}

fn default_beat_lock_timeout() -> u64 {
    120
}

fn default_beat_soft_time_limit() -> u64 {
    300
}

fn default_validation_block_expiration() -> u64 {
    300
}

fn default_beat_multiplier() -> f64 {
    1.0
}

fn default_fence_wait_timeout() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_runner_lock_timeout() -> u64 {
    300
}

fn default_batch_size() -> usize {
    100
}

fn default_runner_soft_time_limit() -> u64 {
    3 * 60 * 60
}

fn default_concurrency() -> usize {
    4
}

fn default_idle_poll_ms() -> u64 {
    500
}

fn default_active_signal_ttl() -> u64 {
    300
}

fn default_sync_frequency() -> u64 {
    6 * 60 * 60
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Application version
    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    /// Whether console output is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether to use colored output
    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    /// Whether file output is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Path to the log file
    #[serde(default = "default_log_path")]
    pub path: String,

    /// Whether to append to existing file
    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
        }
    }
}

/// Logger configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime LoggerConfig.
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console_config = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file_config = self.file.into_file_config()?;

        LoggerConfig::new(console_config, file_config, self.level)
            .map_err(|e| ConfigError::validation("logger".to_string(), e.to_string()))
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self.format.parse::<LogFormat>().map_err(|e| {
            ConfigError::validation("logger.file.format".to_string(), e.to_string())
        })?;

        FileConfig::new(self.enabled, PathBuf::from(self.path), self.append, format)
            .map_err(|e| ConfigError::validation("logger.file".to_string(), e.to_string()))
    }
}

// ============================================================================
// Store and Queue Configuration
// ============================================================================

/// Shared Redis connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_redis_connection_timeout")]
    pub connection_timeout: u64,

    /// Prefix prepended to every key
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            connection_timeout: default_redis_connection_timeout(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

/// Fence store backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

/// Fence store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default)]
    pub redis: RedisConfig,
}

/// Queue transport backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    #[default]
    Memory,
    Redis,
}

/// Queue transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,

    /// Queue group sync tasks are dispatched to
    #[serde(default = "default_queue_name")]
    pub name: String,

    /// Priority group sync tasks are dispatched with
    #[serde(default)]
    pub priority: TaskPriority,

    /// How long a reserved task stays invisible before it is redelivered
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout: u64,

    #[serde(default)]
    pub redis: RedisConfig,
}

impl QueueConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            name: default_queue_name(),
            priority: TaskPriority::default(),
            visibility_timeout: default_visibility_timeout(),
            redis: RedisConfig::default(),
        }
    }
}

// ============================================================================
// Group Sync Configuration
// ============================================================================

/// Scheduler (beat) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatConfig {
    /// Tenant whose entities this process schedules
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,

    /// Seconds between scheduler passes
    #[serde(default = "default_beat_interval")]
    pub interval: u64,

    /// TTL of the tenant beat lock
    #[serde(default = "default_beat_lock_timeout")]
    pub lock_timeout: u64,

    /// A pass running longer than this stops gracefully
    #[serde(default = "default_beat_soft_time_limit")]
    pub soft_time_limit: u64,

    /// Cool-down between fence validation runs
    #[serde(default = "default_validation_block_expiration")]
    pub validation_block_expiration: u64,

    /// Stretch the validation cool-down by `beat_multiplier`
    #[serde(default)]
    pub multi_tenant: bool,

    #[serde(default = "default_beat_multiplier")]
    pub beat_multiplier: f64,
}

impl BeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_timeout)
    }

    pub fn soft_time_limit(&self) -> Duration {
        Duration::from_secs(self.soft_time_limit)
    }

    /// Validation cool-down, scaled when several tenants share the workers.
    pub fn validation_cooldown(&self) -> Duration {
        let base = Duration::from_secs(self.validation_block_expiration);
        if self.multi_tenant {
            base.mul_f64(self.beat_multiplier)
        } else {
            base
        }
    }
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant_id(),
            interval: default_beat_interval(),
            lock_timeout: default_beat_lock_timeout(),
            soft_time_limit: default_beat_soft_time_limit(),
            validation_block_expiration: default_validation_block_expiration(),
            multi_tenant: false,
            beat_multiplier: default_beat_multiplier(),
        }
    }
}

/// Job runner and worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// How long a task waits for its fence to become ready
    #[serde(default = "default_fence_wait_timeout")]
    pub fence_wait_timeout: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// TTL of the per-entity execution lock
    #[serde(default = "default_runner_lock_timeout")]
    pub lock_timeout: u64,

    /// Groups handed to the sink per upsert
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// A run longer than this stops gracefully and is reported failed
    #[serde(default = "default_runner_soft_time_limit")]
    pub soft_time_limit: u64,

    /// Worker slots per process
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause between reservations when the queue is empty
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

impl RunnerConfig {
    pub fn fence_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.fence_wait_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_timeout)
    }

    pub fn soft_time_limit(&self) -> Duration {
        Duration::from_secs(self.soft_time_limit)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            fence_wait_timeout: default_fence_wait_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            lock_timeout: default_runner_lock_timeout(),
            batch_size: default_batch_size(),
            soft_time_limit: default_runner_soft_time_limit(),
            concurrency: default_concurrency(),
            idle_poll_ms: default_idle_poll_ms(),
        }
    }
}

/// Fence validator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Keep a fence whose task is in neither queue snapshot while its active
    /// signal is still alive
    #[serde(default)]
    pub honor_active_signal: bool,

    #[serde(default = "default_active_signal_ttl")]
    pub active_signal_ttl: u64,
}

impl ValidatorConfig {
    pub fn active_signal_ttl(&self) -> Duration {
        Duration::from_secs(self.active_signal_ttl)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            honor_active_signal: false,
            active_signal_ttl: default_active_signal_ttl(),
        }
    }
}

/// Group sync policy for one source type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSettings {
    pub source: SourceType,

    /// Minimum seconds between successful syncs of one entity
    #[serde(default = "default_sync_frequency")]
    pub sync_frequency: u64,

    /// Schedule at most one entity of this source per pass
    #[serde(default)]
    pub single_flight: bool,

    /// Group directory to pull from; without one the source is not synced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_url: Option<String>,
}

/// A sync entity known to this deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySettings {
    pub id: i64,

    pub source: SourceType,

    #[serde(default)]
    pub status: EntityStatus,

    #[serde(default)]
    pub access_type: AccessType,
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub beat: BeatConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub validator: ValidatorConfig,

    #[serde(default)]
    pub sources: Vec<SourceSettings>,

    #[serde(default)]
    pub entities: Vec<EntitySettings>,
}
