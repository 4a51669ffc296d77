//! Ingestion and report requests over the core components.
//!
//! Ingestion is synchronous and cheap: normalize, evaluate, hand any alert to
//! the dispatcher (which never blocks), append. Report requests run the
//! aggregation on the blocking pool under a deadline so a large window cannot
//! stall the async runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use logwatch_core::config::Config;
use logwatch_core::{
    Aggregator, AlertEvaluator, LogLevel, LogRecord, Normalizer, ProjectId, RecordStore, Report,
    ReportError, WebhookConfigSource,
};
use logwatch_dispatch::{DispatchOutcome, Dispatcher};
use serde_json::Value;

/// Failures of [`Pipeline::report`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("report worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// What happened to one ingested payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub project_id: ProjectId,
    pub level: LogLevel,
    /// `Some` when the record triggered an alert.
    pub alert: Option<DispatchOutcome>,
}

pub struct Pipeline {
    normalizer: Normalizer,
    aggregator: Aggregator,
    evaluator: AlertEvaluator,
    store: Arc<dyn RecordStore>,
    webhooks: Arc<dyn WebhookConfigSource>,
    dispatcher: Arc<Dispatcher>,
    report_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        store: Arc<dyn RecordStore>,
        webhooks: Arc<dyn WebhookConfigSource>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            normalizer: Normalizer::new(&config.normalizer),
            aggregator: Aggregator::new(&config.report),
            evaluator: AlertEvaluator::new(&config.alert),
            store,
            webhooks,
            dispatcher,
            report_timeout: config.report.timeout(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Ingest a payload; the project comes from the payload itself.
    pub fn ingest(&self, raw: &Value) -> IngestReceipt {
        self.accept(self.normalizer.normalize(raw))
    }

    /// Ingest a payload on behalf of `project`, overriding whatever the
    /// payload claims.
    pub fn ingest_for_project(&self, project: ProjectId, raw: &Value) -> IngestReceipt {
        let record = self.normalizer.normalize(raw);
        self.accept(LogRecord {
            project_id: project,
            ..record
        })
    }

    /// Ingest one raw line (JSON, logfmt or plain text).
    pub fn ingest_line(&self, line: &str) -> IngestReceipt {
        self.accept(self.normalizer.normalize_line(line))
    }

    fn accept(&self, record: LogRecord) -> IngestReceipt {
        let alert = self
            .webhooks
            .webhook_config(record.project_id)
            .and_then(|cfg| {
                self.evaluator
                    .evaluate(&record, &cfg)
                    .map(|message| self.dispatcher.dispatch(&cfg.target_url, &message))
            });

        let receipt = IngestReceipt {
            project_id: record.project_id,
            level: record.level,
            alert,
        };
        self.store.append(record);
        receipt
    }

    /// Report over `[start, end)` with the configured deadline.
    pub async fn report(
        &self,
        project: ProjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Report, PipelineError> {
        self.report_within(project, start, end, self.report_timeout).await
    }

    /// Report over `[start, end)`, failing with [`ReportError::Timeout`] once
    /// `deadline` has elapsed. Partial results are never returned.
    pub async fn report_within(
        &self,
        project: ProjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        deadline: Duration,
    ) -> Result<Report, PipelineError> {
        if start >= end {
            return Err(ReportError::InvalidRange { start, end }.into());
        }

        let store = self.store.clone();
        let aggregator = self.aggregator.clone();
        let work = tokio::task::spawn_blocking(move || {
            aggregator.aggregate_with_deadline(
                project,
                start,
                end,
                store.query(project, start, end),
                Some(deadline),
            )
        });

        match tokio::time::timeout(deadline, work).await {
            Ok(joined) => Ok(joined??),
            Err(_) => Err(ReportError::Timeout { project, deadline }.into()),
        }
    }
}
