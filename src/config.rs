//! Configuration management for Digger
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all engine settings. It uses the `figment`
//! crate to load configuration from a `digger.toml` file and merge it
//! with environment variables and command-line overrides.

use anyhow::{ensure, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Provider,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::{path::Path, time::Duration};

use crate::core::RecordType;

/// The configuration file read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "digger.toml";

/// The main configuration struct for the engine.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log metrics to the console periodically.
    #[serde(default)]
    pub log_metrics: bool,
    /// Seconds between two logged metrics snapshots.
    #[serde(default = "default_log_aggregation_seconds")]
    pub log_aggregation_seconds: u64,
    /// Settings for the query collaborator.
    #[serde(default)]
    pub query: QueryConfig,
    /// Limits applied to bulk imports.
    #[serde(default)]
    pub import: ImportConfig,
    /// Adaptive batch scheduler tuning.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Multi-server comparison settings.
    #[serde(default)]
    pub comparison: ComparisonConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_aggregation_seconds() -> u64 {
    10
}

/// Configuration for the DNS query executor.
#[serde_as]
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// Per-query timeout, in milliseconds.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timeout_ms")]
    pub timeout: Duration,
    /// Number of attempts the resolver makes before giving up.
    pub attempts: usize,
    /// Maximum number of per-server resolvers kept alive.
    pub cache_capacity: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            attempts: 1,
            cache_capacity: 64,
        }
    }
}

/// Limits applied when validating a bulk import.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ImportConfig {
    /// Largest accepted input, in bytes.
    pub max_file_bytes: u64,
    /// Largest accepted number of lines.
    pub max_lines: usize,
    /// Record type used when a line does not name one.
    pub default_record_type: RecordType,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
            max_lines: 10_000,
            default_record_type: RecordType::A,
        }
    }
}

/// Tuning parameters for the adaptive batch scheduler.
#[serde_as]
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Round size used when a concurrent batch starts, clamped into
    /// `[min_round_size, max_round_size]`.
    pub initial_round_size: usize,
    /// Floor for the adaptive round size.
    pub min_round_size: usize,
    /// Ceiling for the adaptive round size.
    pub max_round_size: usize,
    /// Outcomes that must accumulate before the round size is re-evaluated.
    pub tuning_window: usize,
    /// Minimum time between two tuning decisions, in milliseconds.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "tuning_interval_ms")]
    pub tuning_interval: Duration,
    /// Error rate above which the round size shrinks.
    pub high_error_rate: f64,
    /// Error rate below which the round size grows.
    pub low_error_rate: f64,
    pub decrease_step: usize,
    pub increase_step: usize,
    /// Pause after each task in sequential mode, in milliseconds.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "sequential_yield_ms")]
    pub sequential_yield: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            initial_round_size: 5,
            min_round_size: 3,
            max_round_size: 10,
            tuning_window: 20,
            tuning_interval: Duration::from_millis(5000),
            high_error_rate: 0.20,
            low_error_rate: 0.05,
            decrease_step: 2,
            increase_step: 1,
            sequential_yield: Duration::from_millis(10),
        }
    }
}

/// Settings for multi-server comparison runs.
#[serde_as]
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Pause between two consecutive server queries, in milliseconds.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "yield_between_ms")]
    pub yield_between: Duration,
    /// Fewest servers a comparison may be started with.
    pub min_servers: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            yield_between: Duration::from_millis(50),
            min_servers: 2,
        }
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_metrics: false,
            log_aggregation_seconds: default_log_aggregation_seconds(),
            query: QueryConfig::default(),
            import: ImportConfig::default(),
            batch: BatchConfig::default(),
            comparison: ComparisonConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration by layering defaults, the TOML file,
    /// `DIGGER_` environment variables and finally `overrides`.
    ///
    /// A missing file is not an error; the remaining layers still apply.
    pub fn load(config_path: Option<&Path>, overrides: impl Provider) -> Result<Self> {
        let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            // e.g. DIGGER_BATCH__MAX_ROUND_SIZE=8
            .merge(Env::prefixed("DIGGER_").split("__"))
            .merge(overrides)
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would break the scheduler invariants.
    pub fn validate(&self) -> Result<()> {
        let batch = &self.batch;
        ensure!(batch.min_round_size >= 1, "batch.min_round_size must be at least 1");
        ensure!(
            batch.min_round_size <= batch.max_round_size,
            "batch.min_round_size ({}) exceeds batch.max_round_size ({})",
            batch.min_round_size,
            batch.max_round_size
        );
        ensure!(batch.tuning_window >= 1, "batch.tuning_window must be at least 1");
        ensure!(
            (0.0..=1.0).contains(&batch.low_error_rate)
                && (0.0..=1.0).contains(&batch.high_error_rate)
                && batch.low_error_rate <= batch.high_error_rate,
            "batch error-rate thresholds must satisfy 0 <= low <= high <= 1"
        );
        ensure!(
            self.comparison.min_servers >= 2,
            "comparison.min_servers must be at least 2"
        );
        ensure!(self.import.max_lines >= 1, "import.max_lines must be at least 1");
        ensure!(self.query.attempts >= 1, "query.attempts must be at least 1");
        ensure!(
            self.log_aggregation_seconds >= 1,
            "log_aggregation_seconds must be at least 1"
        );
        Ok(())
    }
}
