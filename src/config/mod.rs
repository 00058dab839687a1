//! Configuration module for enrich-rs
//!
//! This module handles run configuration including:
//! - Pipeline topology (worker count, queue capacities, failure policy)
//! - The identifier source (path, column, header handling)
//! - The lookup service (endpoint, credential, retry policy)
//! - Output targets (records, summary, failures)
//!
//! # Config Location
//!
//! Configuration is read from a TOML file. When no path is given, the
//! platform config directory is used:
//! - **Linux**: `~/.config/enrich-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/enrich-rs/config.toml`
//! - **Windows**: `%APPDATA%\enrich-rs\config.toml`
//!
//! The API key can always be supplied through [`API_KEY_ENV`] instead of the
//! file.
//!
//! # Example
//!
//! ```ignore
//! use enrich_rs::config::EnrichConfig;
//!
//! let mut config = EnrichConfig::load_or_default(None);
//! config.pipeline.worker_count = 50;
//! config.validate()?;
//! config.save("enrich.toml")?;
//! ```

use crate::error::{EnrichError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "enrich-rs";

/// Config filename inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable that overrides `lookup.api_key`
pub const API_KEY_ENV: &str = "ENRICH_API_KEY";

/// Default number of concurrent lookup workers
pub const DEFAULT_WORKER_COUNT: usize = 200;

/// Default capacity of the work and result queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default maximum attempts per lookup (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default per-request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default lookup endpoint
pub const DEFAULT_ENDPOINT: &str = "https://www.omdbapi.com/";

/// Default interval (in records) between progress log lines
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

// ==================== Root Config ====================

/// Complete configuration for one enrichment run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub lookup: LookupConfig,
    pub output: OutputConfig,
}

impl EnrichConfig {
    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EnrichError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml(&content)
            .map_err(|e| e.with_context(format!("Failed to parse config file {:?}", path)))
    }

    /// Parse a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| EnrichError::Config(e.to_string()))
    }

    /// Load from `path` (or the default location), returning defaults if
    /// the file is missing or unreadable
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Self::default(),
            },
        };

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EnrichError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| EnrichError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            EnrichError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Apply environment overrides (currently only the API key)
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.lookup.api_key = Some(key.trim().to_string());
            }
        }
    }

    /// Check that the config describes a runnable pipeline
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.lookup.retry.validate()?;

        if self.source.path.as_os_str().is_empty() {
            return Err(EnrichError::Config("source.path is not set".to_string()));
        }
        if self.output.records_path.as_os_str().is_empty() {
            return Err(EnrichError::Config("output.records_path is not set".to_string()));
        }
        if self.output.summary_path.as_os_str().is_empty() {
            return Err(EnrichError::Config("output.summary_path is not set".to_string()));
        }
        if self.lookup.endpoint.trim().is_empty() {
            return Err(EnrichError::Config("lookup.endpoint is not set".to_string()));
        }
        Ok(())
    }
}

// ==================== Pipeline Config ====================

/// What to do with an identifier whose lookup failed permanently
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Omit the identifier from the records output (logged, and appended to
    /// the failures output when one is configured)
    #[default]
    Skip,
    /// Write the identifier with the failure marker category
    Marker,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Skip => write!(f, "skip"),
            FailurePolicy::Marker => write!(f, "marker"),
        }
    }
}

/// Pipeline topology and policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of concurrent lookup workers
    pub worker_count: usize,

    /// Capacity of the identifier queue (producer -> workers)
    pub work_queue_capacity: usize,

    /// Capacity of the result queue (workers -> writer)
    pub result_queue_capacity: usize,

    /// Handling of permanently failed lookups
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            work_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            result_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject topologies that cannot make progress
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(EnrichError::Config(
                "pipeline.worker_count must be at least 1".to_string(),
            ));
        }
        if self.work_queue_capacity == 0 || self.result_queue_capacity == 0 {
            return Err(EnrichError::Config(
                "pipeline queue capacities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ==================== Source Config ====================

/// Identifier source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Path to the tab-separated input file
    pub path: PathBuf,

    /// Zero-based column holding the identifier
    pub column: usize,

    /// Whether the first line is a header to skip
    pub has_headers: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            column: 0,
            has_headers: false,
        }
    }
}

// ==================== Lookup Config ====================

/// Lookup service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Base URL of the service
    pub endpoint: String,

    /// API key (overridden by the `ENRICH_API_KEY` environment variable)
    pub api_key: Option<String>,

    /// Query parameter carrying the API key
    pub api_key_param: String,

    /// Query parameter carrying the identifier
    pub id_param: String,

    /// Top-level JSON field holding the category
    pub category_field: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Retry policy for transient failures
    pub retry: RetryConfig,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            api_key_param: "apikey".to_string(),
            id_param: "i".to_string(),
            category_field: "Country".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry: RetryConfig::default(),
        }
    }
}

impl LookupConfig {
    /// Per-request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per lookup, first try included
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub initial_backoff_ms: u64,

    /// Upper bound on any single delay in milliseconds
    pub max_backoff_ms: u64,

    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Reject policies that would never attempt a lookup
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(EnrichError::Config(
                "lookup.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.multiplier >= 1.0) {
            return Err(EnrichError::Config(
                "lookup.retry.multiplier must be >= 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

// ==================== Output Config ====================

/// Output targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Records file (`<Identifier>\t<Category>` per line)
    pub records_path: PathBuf,

    /// Summary file (one distinct category per line)
    pub summary_path: PathBuf,

    /// Optional file receiving `<Identifier>\t<reason>` for skipped lookups
    pub failures_path: Option<PathBuf>,

    /// Append to existing files instead of truncating them
    pub append: bool,

    /// Records between progress log lines (0 disables)
    pub progress_interval: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            records_path: PathBuf::new(),
            summary_path: PathBuf::new(),
            failures_path: None,
            append: true,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

// ==================== Tests ====================
