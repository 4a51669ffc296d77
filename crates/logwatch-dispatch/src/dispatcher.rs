//! The dispatcher: lanes, workers and the retry loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use logwatch_core::config::{DispatchConfig, OverflowPolicy};
use logwatch_core::AlertMessage;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatchError;
use crate::lane::{Lane, PushOutcome};
use crate::payload::WebhookPayload;
use crate::policy::RetryPolicy;
use crate::stats::{DeliveryStats, DestinationCounters};
use crate::transport::WebhookTransport;

/// What happened to an alert handed to [`Dispatcher::dispatch`]. Says nothing
/// about eventual delivery, which is best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Queued,
    /// Queued; the destination's oldest waiting alert was dropped for it.
    QueuedDroppedOldest,
    /// Destination lane full; this alert was dropped.
    DroppedNewest,
    /// The dispatcher is shutting down.
    Closed,
}

struct Destination {
    lane: Arc<Lane<WebhookPayload>>,
    counters: Arc<DestinationCounters>,
    worker: Option<JoinHandle<()>>,
}

/// Guarded together so no lane can be opened after shutdown has collected
/// the workers.
#[derive(Default)]
struct Destinations {
    closed: bool,
    by_url: HashMap<String, Destination>,
}

/// Fire-and-forget webhook delivery with per-destination isolation.
///
/// Each target URL gets its own bounded lane and worker task, spawned on the
/// runtime handle given at construction, so a backlog on one URL never delays
/// another URL or the caller.
pub struct Dispatcher {
    transport: Arc<dyn WebhookTransport>,
    policy: RetryPolicy,
    capacity: usize,
    overflow: OverflowPolicy,
    runtime: Handle,
    destinations: Mutex<Destinations>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn WebhookTransport>, cfg: &DispatchConfig, runtime: Handle) -> Self {
        Self {
            transport,
            policy: RetryPolicy::from(cfg),
            capacity: cfg.queue_capacity.max(1),
            overflow: cfg.overflow,
            runtime,
            destinations: Mutex::new(Destinations::default()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Queue `message` for `target_url`. Never blocks and never fails the
    /// caller; delivery problems are logged and counted.
    pub fn dispatch(&self, target_url: &str, message: &AlertMessage) -> DispatchOutcome {
        let payload = WebhookPayload::from(message);
        let (lane, counters) = {
            let mut destinations = self.destinations.lock().unwrap_or_else(|e| e.into_inner());
            if destinations.closed {
                return DispatchOutcome::Closed;
            }
            let dest = destinations
                .by_url
                .entry(target_url.to_string())
                .or_insert_with(|| self.open_destination(target_url));
            (dest.lane.clone(), dest.counters.clone())
        };

        match lane.push(payload) {
            PushOutcome::Queued => {
                counters.queued();
                debug!(url = target_url, "alert queued");
                DispatchOutcome::Queued
            }
            PushOutcome::EvictedOldest => {
                counters.queued();
                counters.dropped();
                warn!(url = target_url, "destination backlog full; dropped oldest alert");
                DispatchOutcome::QueuedDroppedOldest
            }
            PushOutcome::Rejected => {
                counters.dropped();
                warn!(url = target_url, "destination backlog full; dropped new alert");
                DispatchOutcome::DroppedNewest
            }
            PushOutcome::Closed => DispatchOutcome::Closed,
        }
    }

    /// Counters for one destination, if it has ever been dispatched to.
    pub fn stats(&self, target_url: &str) -> Option<DeliveryStats> {
        self.destinations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .by_url
            .get(target_url)
            .map(|d| d.counters.snapshot())
    }

    /// Counters for every known destination, sorted by URL.
    pub fn all_stats(&self) -> Vec<(String, DeliveryStats)> {
        let destinations = self.destinations.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<_> = destinations
            .by_url
            .iter()
            .map(|(url, d)| (url.clone(), d.counters.snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Alerts currently waiting for `target_url`.
    pub fn backlog(&self, target_url: &str) -> usize {
        self.destinations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .by_url
            .get(target_url)
            .map_or(0, |d| d.lane.len())
    }

    /// Stop accepting alerts, let every worker finish what is queued (including
    /// retries), and wait for them.
    pub async fn shutdown(&self) {
        let workers: Vec<(String, JoinHandle<()>)> = {
            let mut destinations = self.destinations.lock().unwrap_or_else(|e| e.into_inner());
            destinations.closed = true;
            destinations
                .by_url
                .iter_mut()
                .filter_map(|(url, d)| {
                    d.lane.close();
                    d.worker.take().map(|w| (url.clone(), w))
                })
                .collect()
        };
        for (url, worker) in workers {
            if let Err(e) = worker.await {
                error!(url = %url, error = %e, "delivery worker ended abnormally");
            }
        }
        info!("dispatcher drained");
    }

    fn open_destination(&self, url: &str) -> Destination {
        let lane = Arc::new(Lane::new(self.capacity, self.overflow));
        let counters = Arc::new(DestinationCounters::default());
        let worker = self.runtime.spawn(run_worker(
            url.to_string(),
            lane.clone(),
            counters.clone(),
            self.transport.clone(),
            self.policy.clone(),
        ));
        info!(url, capacity = self.capacity, "opened delivery lane");
        Destination {
            lane,
            counters,
            worker: Some(worker),
        }
    }
}

async fn run_worker(
    url: String,
    lane: Arc<Lane<WebhookPayload>>,
    counters: Arc<DestinationCounters>,
    transport: Arc<dyn WebhookTransport>,
    policy: RetryPolicy,
) {
    while let Some(payload) = lane.pop().await {
        match deliver(&url, &payload, transport.as_ref(), &policy, &counters).await {
            Ok(attempts) => {
                counters.delivered();
                debug!(url = %url, attempts, "alert delivered");
            }
            Err(e) => {
                counters.exhausted();
                error!(url = %url, error = %e, "alert dropped");
            }
        }
    }
    debug!(url = %url, "delivery lane closed");
}

/// Attempt delivery up to `policy.max_attempts` times. Returns the number of
/// attempts used, or [`DispatchError::Exhausted`] wrapping the last failure.
#[instrument(name = "webhook_deliver", skip_all, fields(url = %url))]
async fn deliver(
    url: &str,
    payload: &WebhookPayload,
    transport: &dyn WebhookTransport,
    policy: &RetryPolicy,
    counters: &DestinationCounters,
) -> Result<u32, DispatchError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        counters.attempt();

        let result = match tokio::time::timeout(policy.attempt_timeout, transport.post(url, payload))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(policy.attempt_timeout)),
        };

        match result {
            Ok(()) => return Ok(attempt),
            Err(last) if attempt >= policy.max_attempts => {
                return Err(DispatchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last: Box::new(last),
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "webhook attempt failed");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
