//! Test builders: ergonomic constructors for `LogRecord`, configs and pipelines.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use logwatch::config::{Config, DispatchConfig, OverflowPolicy};
use logwatch::{
    Dispatcher, LogLevel, LogRecord, MemoryStore, Pipeline, ProjectId, StaticWebhookConfigs,
    Throwable, WebhookConfig, WebhookTransport,
};

/// 2024-01-15T10:00:00Z, the start of every test window.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
}

/// `t0() + secs`.
pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

// ---------------------------------------------------------------------------
// RecordBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`LogRecord`] test fixtures.
///
/// # Example
///
/// ```rust
/// let record = RecordBuilder::new(1, "timeout connecting to db")
///     .level(LogLevel::Error)
///     .at(at(30))
///     .http("GET", "/items", 504, 3000)
///     .build();
/// ```
pub struct RecordBuilder {
    record: LogRecord,
}

impl RecordBuilder {
    pub fn new(project: u64, message: &str) -> Self {
        Self {
            record: LogRecord {
                project_id: ProjectId(project),
                timestamp: t0(),
                level: LogLevel::Info,
                message: Some(message.to_string()),
                logger_name: None,
                environment: None,
                service_name: None,
                request_method: None,
                request_uri: None,
                http_status: None,
                duration_ms: None,
                throwable: None,
                raw: serde_json::json!({ "message": message }),
            },
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.record.level = level;
        self
    }

    pub fn at(mut self, ts: DateTime<Utc>) -> Self {
        self.record.timestamp = ts;
        self
    }

    pub fn env(mut self, env: &str) -> Self {
        self.record.environment = Some(env.to_string());
        self
    }

    pub fn logger(mut self, logger: &str) -> Self {
        self.record.logger_name = Some(logger.to_string());
        self
    }

    pub fn http(mut self, method: &str, uri: &str, status: u16, duration_ms: u64) -> Self {
        self.record.request_method = Some(method.to_string());
        self.record.request_uri = Some(uri.to_string());
        self.record.http_status = Some(status);
        self.record.duration_ms = Some(duration_ms);
        self
    }

    /// Attach a throwable with an explicit signature.
    pub fn throwable(mut self, class: &str, message: &str, signature: &str) -> Self {
        self.record.throwable = Some(Throwable {
            class_name: Some(class.to_string()),
            message: Some(message.to_string()),
            stack_signature: signature.to_string(),
            cause: None,
        });
        self
    }

    pub fn build(self) -> LogRecord {
        self.record
    }
}

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

pub fn info_record(project: u64, message: &str) -> LogRecord {
    RecordBuilder::new(project, message).build()
}

pub fn error_record(project: u64, message: &str) -> LogRecord {
    RecordBuilder::new(project, message).level(LogLevel::Error).build()
}

/// An enabled webhook for `project` pointing at `url`.
pub fn webhook(project: u64, url: &str) -> WebhookConfig {
    WebhookConfig::new(ProjectId(project), url)
}

/// Dispatch settings with short, round delays for timing assertions.
pub fn fast_dispatch(max_attempts: u32) -> DispatchConfig {
    DispatchConfig {
        max_attempts,
        base_delay_ms: 100,
        max_delay_ms: 400,
        attempt_timeout_ms: 1_000,
        queue_capacity: 16,
        overflow: OverflowPolicy::DropOldest,
    }
}

pub fn dispatcher_with(transport: Arc<dyn WebhookTransport>, cfg: &DispatchConfig) -> Dispatcher {
    Dispatcher::new(transport, cfg, tokio::runtime::Handle::current())
}

/// A pipeline over a fresh in-memory store.
pub fn pipeline_with(
    webhooks: Vec<WebhookConfig>,
    transport: Arc<dyn WebhookTransport>,
) -> (Pipeline, Arc<MemoryStore>) {
    let config = Config::defaults();
    let store = Arc::new(MemoryStore::new(config.store.retention_per_project));
    let dispatcher = dispatcher_with(transport, &fast_dispatch(3));
    let pipeline = Pipeline::new(
        &config,
        store.clone(),
        Arc::new(StaticWebhookConfigs::new(webhooks)),
        Arc::new(dispatcher),
    );
    (pipeline, store)
}
