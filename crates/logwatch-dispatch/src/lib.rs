//! logwatch-dispatch — asynchronous webhook alert delivery.
//!
//! The [`Dispatcher`] accepts [`AlertMessage`](logwatch_core::AlertMessage)s
//! without ever blocking the caller and delivers them on background tasks,
//! one bounded lane and one worker per destination URL. A dead endpoint fills
//! its own lane and nothing else.
//!
//! ```text
//! dispatch() ──► Lane (per url, bounded) ──► worker ──► WebhookTransport
//!                                               │
//!                                               └── RetryPolicy (backoff, timeout)
//! ```

pub mod dispatcher;
pub mod error;
pub mod lane;
pub mod payload;
pub mod policy;
pub mod stats;
pub mod transport;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::DispatchError;
pub use payload::{Attachment, AttachmentField, WebhookPayload};
pub use policy::RetryPolicy;
pub use stats::DeliveryStats;
pub use transport::{HttpTransport, WebhookTransport};
