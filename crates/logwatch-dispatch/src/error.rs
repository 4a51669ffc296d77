use std::time::Duration;

/// Delivery failures. Only ever logged and counted: the caller of
/// [`Dispatcher::dispatch`](crate::Dispatcher::dispatch) has moved on by the
/// time any of these happen.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("webhook did not answer within {0:?}")]
    Timeout(Duration),
    #[error("webhook answered with HTTP {status}")]
    Http { status: u16 },
    #[error("webhook request failed: {0}")]
    Transport(String),
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<DispatchError>,
    },
}
