//! Per-destination delivery counters, the only place terminal failures surface.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct DestinationCounters {
    queued: AtomicU64,
    dropped: AtomicU64,
    attempts: AtomicU64,
    delivered: AtomicU64,
    exhausted: AtomicU64,
}

impl DestinationCounters {
    pub(crate) fn queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of one destination's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Alerts accepted into the lane (including ones that evicted an older alert).
    pub queued: u64,
    /// Alerts lost to overflow, whether evicted or rejected.
    pub dropped: u64,
    pub attempts: u64,
    pub delivered: u64,
    /// Alerts abandoned after the last attempt failed.
    pub exhausted: u64,
}
