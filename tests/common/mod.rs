//! Shared test utilities for logwatch integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Dispatcher tests are deterministic under
//! `#[tokio::test(start_paused = true)]`.

pub mod assertions;
pub mod builders;
pub mod fake_transport;
pub mod fake_webhook;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fake_transport::*;
pub use fixtures::*;
