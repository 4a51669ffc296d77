//! Bounded single-consumer queue for one destination.
//!
//! `tokio::sync::mpsc` cannot evict its oldest element, so the lane is a
//! `VecDeque` behind a short-lived std mutex plus a [`Notify`] to wake the
//! worker. The lock is never held across an `.await`.

use std::collections::VecDeque;
use std::sync::Mutex;

use logwatch_core::config::OverflowPolicy;
use tokio::sync::Notify;

/// Result of offering an item to a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest waiting item.
    EvictedOldest,
    /// Lane full under [`OverflowPolicy::DropNewest`]; the item was discarded.
    Rejected,
    /// Lane closed; the item was discarded.
    Closed,
}

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

#[derive(Debug)]
pub struct Lane<T> {
    capacity: usize,
    overflow: OverflowPolicy,
    state: Mutex<State<T>>,
    wake: Notify,
}

impl<T> Lane<T> {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            overflow,
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            wake: Notify::new(),
        }
    }

    /// Never blocks.
    pub fn push(&self, item: T) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.closed {
                return PushOutcome::Closed;
            }
            if state.items.len() < self.capacity {
                state.items.push_back(item);
                PushOutcome::Queued
            } else {
                match self.overflow {
                    OverflowPolicy::DropNewest => return PushOutcome::Rejected,
                    OverflowPolicy::DropOldest => {
                        state.items.pop_front();
                        state.items.push_back(item);
                        PushOutcome::EvictedOldest
                    }
                }
            }
        };
        self.wake.notify_one();
        outcome
    }

    /// Next item, waiting if the lane is empty. `None` once the lane is
    /// closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            self.wake.notified().await;
        }
    }

    /// Stop accepting items. Already queued items are still handed out.
    pub fn close(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).closed = true;
        self.wake.notify_one();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
