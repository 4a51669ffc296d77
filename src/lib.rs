//! logwatch — log aggregation, error reporting and webhook alerting.
//!
//! This crate re-exports the two library crates and adds the [`pipeline`]
//! that wires them together, so integration tests and the `logwatch` binary
//! can import everything from one place.
//!
//! # Architecture
//!
//! ```text
//! payload ──► Normalizer ──► RecordStore ──► Aggregator ──► Report
//!                 │
//!                 └──► AlertEvaluator ──► Dispatcher ──► webhook
//! ```
//!
//! Ingestion, report queries and alert delivery are scheduled independently:
//! ingestion never waits on delivery, and reports read a snapshot of the store.

pub mod pipeline;

pub use logwatch_core::*;
pub use logwatch_dispatch::{
    DeliveryStats, DispatchError, DispatchOutcome, Dispatcher, HttpTransport, RetryPolicy,
    WebhookPayload, WebhookTransport,
};
pub use pipeline::{IngestReceipt, Pipeline, PipelineError};
