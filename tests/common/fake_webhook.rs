//! Fake webhook receiver for integration tests.
//!
//! Spins up a minimal `axum` HTTP server on a random TCP port bound to
//! 127.0.0.1. Serves `POST /hook`, recording every JSON body it receives and
//! answering with the configured status.
//!
//! # Example
//!
//! ```rust,no_run
//! let hook = FakeWebhook::start().await.unwrap();
//! hook.respond_with(503).await;
//! // point the transport at hook.url()
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

struct HookState {
    status: StatusCode,
    received: Vec<Value>,
}

/// Handle to the running fake receiver.
pub struct FakeWebhook {
    addr: SocketAddr,
    state: Arc<Mutex<HookState>>,
}

impl FakeWebhook {
    /// Start the receiver on a random port. Answers 200 until told otherwise.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(HookState {
            status: StatusCode::OK,
            received: Vec::new(),
        }));

        let app = Router::new()
            .route("/hook", post(receive))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Ok(Self { addr, state })
    }

    /// Full URL of the hook endpoint.
    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    pub async fn respond_with(&self, status: u16) {
        self.state.lock().await.status = StatusCode::from_u16(status).unwrap();
    }

    /// Bodies received so far, in arrival order.
    pub async fn received(&self) -> Vec<Value> {
        self.state.lock().await.received.clone()
    }
}

async fn receive(State(state): State<Arc<Mutex<HookState>>>, Json(body): Json<Value>) -> StatusCode {
    let mut state = state.lock().await;
    state.received.push(body);
    state.status
}
