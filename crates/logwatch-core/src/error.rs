//! Typed failures surfaced by the synchronous core components.
//!
//! Normalization has no error type: it only ever degrades to absent fields.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::types::ProjectId;

/// Failures of a report request.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("invalid report range: start {start} is not before end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("report for project {project} exceeded its deadline of {deadline:?}")]
    Timeout {
        project: ProjectId,
        deadline: Duration,
    },
}

/// Invalid configuration, either in the config file or a webhook entry.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("webhook for project {0} is enabled but has no target url")]
    MissingTargetUrl(ProjectId),
    #[error("duplicate webhook configuration for project {0}")]
    DuplicateWebhook(ProjectId),
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
