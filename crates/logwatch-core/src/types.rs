//! Core types for logwatch-core.
//!
//! This module defines the data structures shared across the pipeline: the
//! canonical [`LogRecord`], its [`LogLevel`], the [`Throwable`] chain, the
//! per-project [`WebhookConfig`] and the outbound [`AlertMessage`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Identifier of the project a record belongs to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ProjectId {
    fn from(id: u64) -> Self {
        ProjectId(id)
    }
}

/// Log severity level, normalised across all producers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

/// Producers spell levels in many ways; everything here maps onto the six
/// canonical levels. Keys are lowercase.
static LEVEL_ALIASES: phf::Map<&'static str, LogLevel> = phf::phf_map! {
    "trace" => LogLevel::Trace,
    "finest" => LogLevel::Trace,
    "finer" => LogLevel::Trace,
    "verbose" => LogLevel::Trace,
    "debug" => LogLevel::Debug,
    "dbg" => LogLevel::Debug,
    "fine" => LogLevel::Debug,
    "config" => LogLevel::Debug,
    "info" => LogLevel::Info,
    "information" => LogLevel::Info,
    "informational" => LogLevel::Info,
    "notice" => LogLevel::Info,
    "warn" => LogLevel::Warn,
    "warning" => LogLevel::Warn,
    "wrn" => LogLevel::Warn,
    "error" => LogLevel::Error,
    "err" => LogLevel::Error,
    "severe" => LogLevel::Error,
    "fatal" => LogLevel::Fatal,
    "critical" => LogLevel::Fatal,
    "crit" => LogLevel::Fatal,
    "alert" => LogLevel::Fatal,
    "emerg" => LogLevel::Fatal,
    "emergency" => LogLevel::Fatal,
    "panic" => LogLevel::Fatal,
};

impl LogLevel {
    /// Every level, lowest severity first.
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    /// Parse a level name leniently (case-insensitive, common aliases,
    /// syslog numeric severities). Returns `None` for anything unrecognised.
    pub fn parse_lenient(s: &str) -> Option<LogLevel> {
        let trimmed = s.trim();
        if let Some(level) = LEVEL_ALIASES.get(trimmed.to_ascii_lowercase().as_str()) {
            return Some(*level);
        }
        // syslog severities 0..=7
        match trimmed.parse::<u8>().ok()? {
            0..=2 => Some(LogLevel::Fatal),
            3 => Some(LogLevel::Error),
            4 => Some(LogLevel::Warn),
            5 | 6 => Some(LogLevel::Info),
            7 => Some(LogLevel::Debug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An exception attached to a log record, with its cause chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Throwable {
    pub class_name: Option<String>,
    pub message: Option<String>,
    /// Stable hash grouping "the same" exception across requests.
    pub stack_signature: String,
    pub cause: Option<Box<Throwable>>,
}

impl Throwable {
    /// Iterate over this throwable and every cause beneath it.
    pub fn chain(&self) -> impl Iterator<Item = &Throwable> {
        std::iter::successors(Some(self), |t| t.cause.as_deref())
    }
}

/// The canonical log record produced by the normalizer.
///
/// `timestamp` and `level` are always set. Every other field is optional and
/// is never `Some("")`: the normalizer collapses empty values to `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub project_id: ProjectId,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: Option<String>,
    pub logger_name: Option<String>,
    pub environment: Option<String>,
    pub service_name: Option<String>,
    pub request_method: Option<String>,
    pub request_uri: Option<String>,
    pub http_status: Option<u16>,
    pub duration_ms: Option<u64>,
    pub throwable: Option<Throwable>,
    /// Original payload as received, retained for audit.
    pub raw: serde_json::Value,
}

impl LogRecord {
    /// Message text, or `""` when absent.
    pub fn message_str(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

/// Per-project webhook alerting configuration. Read-only from the core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WebhookConfig {
    pub project_id: ProjectId,
    #[serde(default)]
    pub target_url: String,
    /// Lowercase keywords; empty matches every record.
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// Empty or absent matches every environment.
    #[serde(default)]
    pub environment_filter: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

impl WebhookConfig {
    pub fn new(project_id: ProjectId, target_url: impl Into<String>) -> Self {
        Self {
            project_id,
            target_url: target_url.into(),
            keywords: BTreeSet::new(),
            environment_filter: None,
            enabled: true,
        }
    }

    /// Add keywords, lowercasing them and skipping blanks.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords.extend(
            keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment_filter = Some(environment.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.target_url.trim().is_empty() {
            return Err(ConfigError::MissingTargetUrl(self.project_id));
        }
        Ok(())
    }
}

/// Attachment colour derived from a record's level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertColor {
    Red,
    Yellow,
    Default,
}

impl AlertColor {
    pub fn for_level(level: LogLevel) -> Self {
        match level {
            LogLevel::Fatal | LogLevel::Error => AlertColor::Red,
            LogLevel::Warn => AlertColor::Yellow,
            _ => AlertColor::Default,
        }
    }

    pub fn as_hex(&self) -> &'static str {
        match self {
            AlertColor::Red => "#FF0000",
            AlertColor::Yellow => "#FFCC00",
            AlertColor::Default => "#808080",
        }
    }
}

/// One key/value line in an alert attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

/// A built alert, ready for the dispatcher. Discarded after send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub text: String,
    pub color: AlertColor,
    pub title: String,
    pub title_link: Option<String>,
    pub fields: Vec<AlertField>,
}
