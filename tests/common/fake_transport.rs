//! In-process `WebhookTransport` with scripted behaviour per URL.
//!
//! Records every attempt with its `tokio::time::Instant`, so retry spacing can
//! be asserted exactly under a paused clock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use logwatch::{DispatchError, WebhookPayload, WebhookTransport};
use tokio::time::Instant;

/// How a scripted URL answers.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// 2xx on every attempt.
    Succeed,
    /// Fails every attempt with this HTTP status.
    FailWith(u16),
    /// Fails the first `n` attempts with 500, then succeeds.
    FailTimes(u32),
    /// Never answers; only the attempt timeout ends it.
    Hang,
    /// Answers 2xx after sleeping.
    Slow(Duration),
}

#[derive(Debug, Clone)]
pub struct Attempt {
    pub url: String,
    pub at: Instant,
    pub payload: WebhookPayload,
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Script>>,
    attempts: Mutex<Vec<Attempt>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the behaviour of `url`. Unscripted URLs succeed.
    pub fn script(self, url: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(url.to_string(), script);
        self
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, url: &str) -> Vec<Attempt> {
        self.attempts().into_iter().filter(|a| a.url == url).collect()
    }

    /// Gaps between consecutive attempts on `url`.
    pub fn gaps_for(&self, url: &str) -> Vec<Duration> {
        self.attempts_for(url)
            .windows(2)
            .map(|w| w[1].at - w[0].at)
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for ScriptedTransport {
    async fn post(&self, url: &str, payload: &WebhookPayload) -> Result<(), DispatchError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(Script::Succeed);
        let nth = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(Attempt {
                url: url.to_string(),
                at: Instant::now(),
                payload: payload.clone(),
            });
            attempts.iter().filter(|a| a.url == url).count() as u32
        };

        match script {
            Script::Succeed => Ok(()),
            Script::FailWith(status) => Err(DispatchError::Http { status }),
            Script::FailTimes(n) if nth <= n => Err(DispatchError::Http { status: 500 }),
            Script::FailTimes(_) => Ok(()),
            Script::Hang => std::future::pending().await,
            Script::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}
