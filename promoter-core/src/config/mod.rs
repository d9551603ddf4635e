//! Run configuration: worker concurrency, retry budget, request-counter
//! thresholds/windows, HTTP timeout, dry-run default.
//!
//! Layered the way the teacher's `librex::config::Config` is: defaults →
//! optional YAML file → environment variables (`PROMOTER_*`), via the
//! `config` crate.

use crate::error::{PromoError, Result};
use config::{Config as ConfigRs, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;


/// Root run configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub rate: RateConfig,
    /// Whether to actually execute edges (`true`) or just report what would
    /// happen (`false`). The CLI's `--confirm` flag overrides this per-run.
    #[serde(default)]
    pub confirm: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: WorkerConfig::default(),
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
            rate: RateConfig::default(),
            confirm: false,
        }
    }
}

impl RunConfig {
    /// Parses a `RunConfig` from a YAML string layered over defaults. Used
    /// directly by tests and indirectly by [`RunConfig::load`].
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let builder = ConfigRs::builder()
            .add_source(ConfigRs::try_from(&RunConfig::default()).map_err(config_err)?)
            .add_source(File::from_str(s, FileFormat::Yaml));
        Self::from_builder(builder)
    }

    /// Loads a `RunConfig` from defaults, an optional YAML file, then
    /// `PROMOTER_*` environment variables, in that precedence order.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigRs::builder()
            .add_source(ConfigRs::try_from(&RunConfig::default()).map_err(config_err)?);

        if let Some(p) = path {
            builder = builder.add_source(File::from(p).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("PROMOTER")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| PromoError::config_with_source("failed to load run configuration", e))
    }
}

fn config_err(e: config::ConfigError) -> PromoError {
    PromoError::config_with_source("failed to build configuration defaults", e)
}

impl RunConfig {
    /// Projects this config's `workers`/`retry` settings onto the inventory
    /// reader's tuning knobs, so a CLI command only has to build one
    /// `RunConfig` instead of wiring each subsystem's options by hand.
    pub fn reader_options(&self) -> crate::inventory::ReaderOptions {
        crate::inventory::ReaderOptions {
            worker_count: self.workers.resolved(),
            retry_attempts: self.retry.attempts,
            retry_backoff_ms: self.retry.initial_backoff_ms,
            allow_partial: false,
        }
    }

    /// Projects this config's `workers`/`retry`/`confirm` settings onto the
    /// executor's tuning knobs.
    pub fn executor_options(&self) -> crate::executor::ExecutorOptions {
        crate::executor::ExecutorOptions {
            worker_count: self.workers.resolved(),
            retry_attempts: self.retry.attempts,
            initial_backoff_ms: self.retry.initial_backoff_ms,
            confirm: self.confirm,
        }
    }
}

/// Worker-pool sizing, shared by the inventory reader and the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerConfig {
    /// `0` means "default to `2 * core count`" (§4.C / §4.E).
    #[serde(default)]
    pub count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { count: 0 }
    }
}

impl WorkerConfig {
    /// Resolves the configured count, substituting `2 * core count` for `0`.
    pub fn resolved(&self) -> usize {
        if self.count > 0 {
            self.count
        } else {
            2 * std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        }
    }
}

/// Retry budget shared by the inventory reader and the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u8,
    #[serde(default = "default_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            initial_backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_retry_attempts() -> u8 {
    8
}

fn default_backoff_ms() -> u64 {
    500
}

/// Per-request HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    600
}

/// Request-counter window thresholds (§4.F).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateConfig {
    #[serde(default = "default_short_window_threshold")]
    pub short_window_threshold: u64,
    #[serde(default = "default_long_window_threshold")]
    pub long_window_threshold: u64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            short_window_threshold: default_short_window_threshold(),
            long_window_threshold: default_long_window_threshold(),
        }
    }
}

fn default_short_window_threshold() -> u64 {
    50_000
}

fn default_long_window_threshold() -> u64 {
    1_000_000
}
