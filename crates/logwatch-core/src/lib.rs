//! logwatch-core — normalization, aggregation and alert evaluation.
//!
//! Everything in this crate is synchronous and free of network access. The
//! delivery side lives in `logwatch-dispatch`.
//!
//! # Architecture
//!
//! ```text
//! payload ──► Normalizer ──► RecordStore ──► Aggregator ──► Report
//!                 │
//!                 └──► AlertEvaluator ──► AlertMessage ──► (dispatcher)
//! ```

pub mod aggregator;
pub mod alert;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod report;
pub mod signature;
pub mod store;
pub mod types;

pub use aggregator::Aggregator;
pub use alert::AlertEvaluator;
pub use error::{ConfigError, ReportError};
pub use normalizer::Normalizer;
pub use report::{EndpointLatency, ErrorGroup, Report, ReportResponse};
pub use store::{MemoryStore, RecordStore, StaticWebhookConfigs, WebhookConfigSource};
pub use types::{
    AlertColor, AlertField, AlertMessage, LogLevel, LogRecord, ProjectId, Throwable,
    WebhookConfig,
};
