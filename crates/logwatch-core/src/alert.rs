//! Decides whether one record should alert and builds the message.
//!
//! Gates, in order: webhook enabled, severity (WARN and above), environment
//! filter, keyword match. Building the message is deterministic and touches
//! neither network nor storage.

use crate::config::AlertConfig;
use crate::types::{
    AlertColor, AlertField, AlertMessage, LogLevel, LogRecord, WebhookConfig,
};

/// Severity floor no configuration can lower.
const ALERT_FLOOR: LogLevel = LogLevel::Warn;

#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    min_level: LogLevel,
    link_base: Option<String>,
    max_text_len: usize,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(&AlertConfig::default())
    }
}

impl AlertEvaluator {
    pub fn new(cfg: &AlertConfig) -> Self {
        let link_base = cfg.link_base.trim().trim_end_matches('/');
        Self {
            min_level: cfg.min_level.max(ALERT_FLOOR),
            link_base: (!link_base.is_empty()).then(|| link_base.to_string()),
            max_text_len: cfg.max_text_len.max(16),
        }
    }

    /// `None` when the record should not alert under `config`.
    pub fn evaluate(&self, record: &LogRecord, config: &WebhookConfig) -> Option<AlertMessage> {
        if !config.enabled || record.level < self.min_level {
            return None;
        }
        if !environment_matches(record, config) || !keywords_match(record, config) {
            return None;
        }
        Some(self.build(record))
    }

    fn build(&self, record: &LogRecord) -> AlertMessage {
        let mut fields = Vec::new();
        let mut push = |title: &str, value: String, short: bool| {
            fields.push(AlertField {
                title: title.to_string(),
                value,
                short,
            })
        };

        if let Some(method) = &record.request_method {
            push("Method", method.clone(), true);
        }
        if let Some(uri) = &record.request_uri {
            push("URI", uri.clone(), true);
        }
        if let Some(status) = record.http_status {
            push("Status", status.to_string(), true);
        }
        if let Some(duration) = record.duration_ms {
            push("Duration", format!("{duration} ms"), true);
        }
        if let Some(class) = record.throwable.as_ref().and_then(|t| t.class_name.as_ref()) {
            push("Exception", class.clone(), false);
        }

        let summary = record
            .message
            .as_deref()
            .or_else(|| record.throwable.as_ref().and_then(|t| t.message.as_deref()))
            .unwrap_or("(no message)");
        let text = truncate(
            &match &record.logger_name {
                Some(logger) => format!("[{}] {logger}: {summary}", record.level),
                None => format!("[{}] {summary}", record.level),
            },
            self.max_text_len,
        );

        let title = match &record.environment {
            Some(env) => format!("{} in project {} ({env})", record.level, record.project_id),
            None => format!("{} in project {}", record.level, record.project_id),
        };

        AlertMessage {
            text,
            color: AlertColor::for_level(record.level),
            title,
            title_link: self
                .link_base
                .as_ref()
                .map(|base| format!("{base}/projects/{}/logs", record.project_id)),
            fields,
        }
    }
}

fn environment_matches(record: &LogRecord, config: &WebhookConfig) -> bool {
    match config.environment_filter.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(wanted) => record
            .environment
            .as_deref()
            .is_some_and(|env| env.trim().eq_ignore_ascii_case(wanted)),
    }
}

/// Empty keyword set matches everything.
fn keywords_match(record: &LogRecord, config: &WebhookConfig) -> bool {
    if config.keywords.is_empty() {
        return true;
    }
    let mut haystacks: Vec<String> = Vec::new();
    if let Some(message) = &record.message {
        haystacks.push(message.to_lowercase());
    }
    if let Some(throwable) = &record.throwable {
        haystacks.extend(throwable.chain().filter_map(|t| t.message.as_deref()).map(str::to_lowercase));
    }
    config.keywords.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        haystacks.iter().any(|h| h.contains(&keyword))
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}
