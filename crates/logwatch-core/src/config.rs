//! Configuration types for logwatch.
//!
//! [`Config::load`] reads `~/.config/logwatch/config.toml`, creating it with
//! hardcoded defaults if it does not yet exist; a location that cannot be
//! written falls back to the built-in config, but a file that exists must parse
//! and validate. [`Config::load_from`] reads an explicit path. Both layer `LOGWATCH_*` environment variables on top
//! (`LOGWATCH_DISPATCH__MAX_ATTEMPTS=5`). [`Config::defaults`] returns the
//! built-in defaults without touching the filesystem (useful in tests).

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::{LogLevel, WebhookConfig};

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[normalizer]
stack_frames    = 5
max_cause_depth = 8

[report]
top_errors               = 5
slow_endpoints           = 5
max_samples_per_endpoint = 10000
collapse_path_ids        = true
timeout_ms               = 30000

[alert]
min_level    = "WARN"
link_base    = ""
max_text_len = 500

[dispatch]
max_attempts       = 4
base_delay_ms      = 500
max_delay_ms       = 8000
attempt_timeout_ms = 5000
queue_capacity     = 64
overflow           = "drop_oldest"

[store]
retention_per_project = 100000
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// `[[webhooks]]` entries, one per project.
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// `[normalizer]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerConfig {
    /// Number of leading stack frames folded into a stack signature.
    #[serde(default = "default_stack_frames")]
    pub stack_frames: usize,
    #[serde(default = "default_max_cause_depth")]
    pub max_cause_depth: usize,
}

fn default_stack_frames() -> usize { 5 }
fn default_max_cause_depth() -> usize { 8 }

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            stack_frames: default_stack_frames(),
            max_cause_depth: default_max_cause_depth(),
        }
    }
}

/// `[report]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_top_n")]
    pub top_errors: usize,
    #[serde(default = "default_top_n")]
    pub slow_endpoints: usize,
    /// Reservoir size per endpoint for the p95 estimate. Below this, p95 is exact.
    #[serde(default = "default_max_samples")]
    pub max_samples_per_endpoint: usize,
    /// Collapse numeric and UUID path segments into `{id}` when grouping endpoints.
    #[serde(default = "default_true")]
    pub collapse_path_ids: bool,
    #[serde(default = "default_report_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_top_n() -> usize { 5 }
fn default_max_samples() -> usize { 10_000 }
fn default_true() -> bool { true }
fn default_report_timeout_ms() -> u64 { 30_000 }

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_errors: default_top_n(),
            slow_endpoints: default_top_n(),
            max_samples_per_endpoint: default_max_samples(),
            collapse_path_ids: default_true(),
            timeout_ms: default_report_timeout_ms(),
        }
    }
}

impl ReportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// `[alert]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Lowest level that may alert. Values below WARN are raised to WARN.
    #[serde(default = "default_min_level")]
    pub min_level: LogLevel,
    /// Base URL used to build the attachment `title_link`; empty disables it.
    #[serde(default)]
    pub link_base: String,
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
}

fn default_min_level() -> LogLevel { LogLevel::Warn }
fn default_max_text_len() -> usize { 500 }

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_level: default_min_level(),
            link_base: String::new(),
            max_text_len: default_max_text_len(),
        }
    }
}

/// What a full destination queue does with a new alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued alert to make room.
    #[default]
    DropOldest,
    /// Reject the incoming alert.
    DropNewest,
}

/// `[dispatch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    /// Alerts buffered per destination before the overflow policy applies.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

fn default_max_attempts() -> u32 { 4 }
fn default_base_delay_ms() -> u64 { 500 }
fn default_max_delay_ms() -> u64 { 8_000 }
fn default_attempt_timeout_ms() -> u64 { 5_000 }
fn default_queue_capacity() -> usize { 64 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            queue_capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Records retained per project by the in-memory store; oldest evicted first.
    #[serde(default = "default_retention")]
    pub retention_per_project: usize,
}

fn default_retention() -> usize { 100_000 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention_per_project: default_retention(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `~/.config/logwatch/config.toml`, layered on top of the
    /// built-in defaults. See [`Config::load_or_create`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_create(&Self::default_path())
    }

    /// Load `path`, first writing the built-in defaults there if it does not
    /// exist. Only a failure to create the file falls back to the built-in
    /// config; parse and validation errors are returned.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            if let Err(e) = write_default(path) {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "cannot create config file; using built-in config"
                );
                return Ok(Self::defaults());
            }
        }
        Self::load_from(path)
    }

    /// `$XDG_CONFIG_HOME/logwatch/config.toml`, or `~/.config/logwatch/config.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                    .join(".config")
            })
            .join("logwatch")
            .join("config.toml")
    }

    /// Load from an explicit file, layered on top of the built-in defaults.
    /// A missing file is an error here, unlike [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("LOGWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }

    /// Reject enabled webhooks without a target and duplicate project entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for hook in &self.webhooks {
            hook.validate()?;
            if !seen.insert(hook.project_id) {
                return Err(ConfigError::DuplicateWebhook(hook.project_id));
            }
        }
        Ok(())
    }
}

fn write_default(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG.trim_start())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
