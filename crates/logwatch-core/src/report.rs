//! Report types produced by the [`Aggregator`](crate::aggregator::Aggregator).

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::types::{LogLevel, ProjectId};

/// One group of "the same" error within a report window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorGroup {
    pub stack_signature: String,
    pub class_name: Option<String>,
    pub message: Option<String>,
    pub occurrence_count: u64,
    pub last_seen: DateTime<Utc>,
}

/// Latency summary of one `(method, uri)` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointLatency {
    pub method: String,
    pub uri: String,
    pub average_ms: f64,
    pub p95_ms: u64,
    pub sample_count: u64,
}

/// Windowed summary of one project's records. Built fresh per query.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub project_id: ProjectId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    /// Every level is present, zero when unseen.
    pub total_log_counts: BTreeMap<LogLevel, u64>,
    /// Integer percentages summing to exactly 100 for a non-empty window.
    pub log_level_distribution: BTreeMap<LogLevel, u32>,
    pub top_errors: Vec<ErrorGroup>,
    pub slow_backend_apis: Vec<EndpointLatency>,
}

impl Report {
    pub fn count(&self, level: LogLevel) -> u64 {
        self.total_log_counts.get(&level).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total_log_counts.values().sum()
    }

    /// `2024-01-15T10:00:00Z ~ 2024-01-15T12:00:00Z`
    pub fn period_description(&self) -> String {
        format!(
            "{} ~ {}",
            self.period_start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.period_end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    pub fn to_response(&self) -> ReportResponse {
        ReportResponse {
            project_id: self.project_id,
            period_description: self.period_description(),
            generated_at: self.generated_at,
            total_log_counts: self.total_log_counts.clone(),
            log_level_distribution: self.log_level_distribution.clone(),
            top_errors: self.top_errors.clone(),
            slow_backend_apis: self.slow_backend_apis.clone(),
        }
    }
}

/// Report shape handed to the report-request flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub project_id: ProjectId,
    pub period_description: String,
    pub generated_at: DateTime<Utc>,
    pub total_log_counts: BTreeMap<LogLevel, u64>,
    pub log_level_distribution: BTreeMap<LogLevel, u32>,
    pub top_errors: Vec<ErrorGroup>,
    pub slow_backend_apis: Vec<EndpointLatency>,
}
