//! One streaming pass over a window of records into a [`Report`].
//!
//! State is local to one computation and needs no locking:
//!
//! - per-level counters,
//! - error groups keyed by stack signature (ERROR and above),
//! - per-endpoint latency tallies: exact sum and count, plus a bounded
//!   reservoir for the p95.
//!
//! Top-N selection runs through a min-heap of size N, so selection memory
//! does not grow with the number of distinct groups. The window is half-open:
//! `period_start` is included, `period_end` is not.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::report::{EndpointLatency, ErrorGroup, Report};
use crate::signature;
use crate::types::{LogLevel, LogRecord, ProjectId};

/// How many records are folded between deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;
const RESERVOIR_SEED: u64 = 0x5eed_1095;
const UNKNOWN_METHOD: &str = "UNKNOWN";

static ID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+|[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|[0-9a-f]{24,})$")
        .expect("id segment pattern")
});

/// Builds [`Report`]s. Cheap to construct; holds only configuration and the
/// clock used for `generated_at`.
#[derive(Debug, Clone)]
pub struct Aggregator {
    top_errors: usize,
    slow_endpoints: usize,
    max_samples: usize,
    collapse_path_ids: bool,
    clock: fn() -> DateTime<Utc>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(&ReportConfig::default())
    }
}

impl Aggregator {
    pub fn new(cfg: &ReportConfig) -> Self {
        Self {
            top_errors: cfg.top_errors,
            slow_endpoints: cfg.slow_endpoints,
            max_samples: cfg.max_samples_per_endpoint.max(1),
            collapse_path_ids: cfg.collapse_path_ids,
            clock: Utc::now,
        }
    }

    /// Replace the clock that stamps `generated_at`.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Aggregate without a deadline.
    pub fn aggregate<I>(
        &self,
        project: ProjectId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        records: I,
    ) -> Result<Report, ReportError>
    where
        I: IntoIterator<Item = LogRecord>,
    {
        self.aggregate_with_deadline(project, period_start, period_end, records, None)
    }

    /// Aggregate, failing with [`ReportError::Timeout`] once `deadline` has
    /// elapsed. Partial state is dropped on timeout.
    pub fn aggregate_with_deadline<I>(
        &self,
        project: ProjectId,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        records: I,
        deadline: Option<Duration>,
    ) -> Result<Report, ReportError>
    where
        I: IntoIterator<Item = LogRecord>,
    {
        if period_start >= period_end {
            return Err(ReportError::InvalidRange {
                start: period_start,
                end: period_end,
            });
        }

        let started = Instant::now();
        let check_deadline = |seen: u64| match deadline {
            Some(budget) if seen % DEADLINE_CHECK_INTERVAL == 0 && started.elapsed() > budget => {
                Err(ReportError::Timeout {
                    project,
                    deadline: budget,
                })
            }
            _ => Ok(()),
        };

        let mut levels = LevelCounts::default();
        let mut errors: HashMap<String, ErrorTally> = HashMap::new();
        let mut endpoints = EndpointTallies::new(self.max_samples);
        let mut seen: u64 = 0;

        for record in records {
            seen += 1;
            check_deadline(seen)?;

            if record.project_id != project
                || record.timestamp < period_start
                || record.timestamp >= period_end
            {
                continue;
            }

            levels.add(record.level);

            if record.level >= LogLevel::Error {
                let (key, tally) = ErrorTally::from_record(&record);
                errors
                    .entry(key)
                    .and_modify(|existing| existing.merge(&tally))
                    .or_insert(tally);
            }

            if let (Some(duration), Some(uri)) = (record.duration_ms, record.request_uri.as_deref())
            {
                let method = record
                    .request_method
                    .as_deref()
                    .unwrap_or(UNKNOWN_METHOD)
                    .to_ascii_uppercase();
                let uri = endpoint_path(uri, self.collapse_path_ids);
                endpoints.add(method, uri, duration);
            }
        }

        if let Some(budget) = deadline {
            if started.elapsed() > budget {
                return Err(ReportError::Timeout {
                    project,
                    deadline: budget,
                });
            }
        }

        tracing::debug!(
            %project,
            scanned = seen,
            error_groups = errors.len(),
            endpoints = endpoints.by_endpoint.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "report aggregated"
        );

        Ok(Report {
            project_id: project,
            period_start,
            period_end,
            generated_at: (self.clock)(),
            total_log_counts: levels.totals(),
            log_level_distribution: levels.distribution(),
            top_errors: top_errors(errors, self.top_errors),
            slow_backend_apis: endpoints.slowest(self.slow_endpoints),
        })
    }
}

// ---------------------------------------------------------------------------
// Level counts
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LevelCounts([u64; LogLevel::ALL.len()]);

impl LevelCounts {
    fn add(&mut self, level: LogLevel) {
        self.0[level as usize] += 1;
    }

    fn totals(&self) -> BTreeMap<LogLevel, u64> {
        LogLevel::ALL.iter().map(|l| (*l, self.0[*l as usize])).collect()
    }

    /// Truncated percentages; the remainder goes to the largest bucket
    /// (higher severity on ties) so the total is exactly 100.
    fn distribution(&self) -> BTreeMap<LogLevel, u32> {
        let total: u64 = self.0.iter().sum();
        let mut pct: BTreeMap<LogLevel, u32> = LogLevel::ALL
            .iter()
            .map(|l| {
                let share = if total == 0 { 0 } else { self.0[*l as usize] * 100 / total };
                (*l, share as u32)
            })
            .collect();

        if total > 0 {
            let assigned: u32 = pct.values().sum();
            let largest = LogLevel::ALL
                .iter()
                .copied()
                .max_by_key(|l| (self.0[*l as usize], *l))
                .unwrap_or(LogLevel::Info);
            if let Some(bucket) = pct.get_mut(&largest) {
                *bucket += 100 - assigned;
            }
        }
        pct
    }
}

// ---------------------------------------------------------------------------
// Error groups
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ErrorTally {
    count: u64,
    last_seen: DateTime<Utc>,
    class_name: Option<String>,
    message: Option<String>,
}

impl ErrorTally {
    fn from_record(record: &LogRecord) -> (String, Self) {
        match &record.throwable {
            Some(t) => (
                t.stack_signature.clone(),
                Self {
                    count: 1,
                    last_seen: record.timestamp,
                    class_name: t.class_name.clone(),
                    message: t.message.clone().or_else(|| record.message.clone()),
                },
            ),
            None => (
                signature::message_signature(record.message_str()),
                Self {
                    count: 1,
                    last_seen: record.timestamp,
                    class_name: None,
                    message: record.message.clone(),
                },
            ),
        }
    }

    /// Keeps the most recent occurrence's class and message.
    fn merge(&mut self, other: &ErrorTally) {
        self.count += other.count;
        if other.last_seen >= self.last_seen {
            self.last_seen = other.last_seen;
            self.class_name = other.class_name.clone();
            self.message = other.message.clone();
        }
    }
}

fn top_errors(errors: HashMap<String, ErrorTally>, n: usize) -> Vec<ErrorGroup> {
    let ranked = errors.into_iter().map(|(signature, tally)| Ranked {
        key: (tally.count, tally.last_seen, Reverse(signature.clone())),
        value: ErrorGroup {
            stack_signature: signature,
            class_name: tally.class_name,
            message: tally.message,
            occurrence_count: tally.count,
            last_seen: tally.last_seen,
        },
    });
    top_n(ranked, n)
}

// ---------------------------------------------------------------------------
// Endpoint latencies
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EndpointTally {
    count: u64,
    sum_ms: u128,
    reservoir: Vec<u64>,
}

#[derive(Debug)]
struct EndpointTallies {
    capacity: usize,
    rng: StdRng,
    by_endpoint: HashMap<(String, String), EndpointTally>,
}

impl EndpointTallies {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rng: StdRng::seed_from_u64(RESERVOIR_SEED),
            by_endpoint: HashMap::new(),
        }
    }

    fn add(&mut self, method: String, uri: String, duration_ms: u64) {
        let tally = self.by_endpoint.entry((method, uri)).or_default();
        tally.count += 1;
        tally.sum_ms += u128::from(duration_ms);
        if tally.reservoir.len() < self.capacity {
            tally.reservoir.push(duration_ms);
        } else {
            let slot = self.rng.random_range(0..tally.count) as usize;
            if slot < self.capacity {
                tally.reservoir[slot] = duration_ms;
            }
        }
    }

    fn slowest(self, n: usize) -> Vec<EndpointLatency> {
        let ranked = self.by_endpoint.into_iter().map(|((method, uri), mut tally)| {
            let average_ms = tally.sum_ms as f64 / tally.count as f64;
            let p95_ms = nearest_rank(&mut tally.reservoir, 0.95);
            Ranked {
                key: (
                    p95_ms,
                    (average_ms * 1000.0) as u64,
                    Reverse((method.clone(), uri.clone())),
                ),
                value: EndpointLatency {
                    method,
                    uri,
                    average_ms,
                    p95_ms,
                    sample_count: tally.count,
                },
            }
        });
        top_n(ranked, n)
    }
}

/// Nearest-rank percentile; sorts `samples` in place.
fn nearest_rank(samples: &mut [u64], quantile: f64) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    samples.sort_unstable();
    let rank = (quantile * samples.len() as f64).ceil() as usize;
    samples[rank.clamp(1, samples.len()) - 1]
}

/// Path used to group endpoints: no scheme/host, no query or fragment, and
/// optionally id-like segments collapsed into `{id}`.
fn endpoint_path(uri: &str, collapse_ids: bool) -> String {
    let without_host = match uri.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => uri,
    };
    let path = without_host
        .split(['?', '#'])
        .next()
        .unwrap_or(without_host);
    if !collapse_ids {
        return path.to_string();
    }
    path.split('/')
        .map(|segment| {
            if ID_SEGMENT.is_match(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Bounded top-N selection
// ---------------------------------------------------------------------------

/// A value ordered only by its key.
struct Ranked<K, V> {
    key: K,
    value: V,
}

impl<K: Ord, V> PartialEq for Ranked<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Ord, V> Eq for Ranked<K, V> {}

impl<K: Ord, V> PartialOrd for Ranked<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, V> Ord for Ranked<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// The `n` highest-ranked values, highest first, using a min-heap of size `n`.
fn top_n<K: Ord, V>(items: impl Iterator<Item = Ranked<K, V>>, n: usize) -> Vec<V> {
    if n == 0 {
        return Vec::new();
    }
    let mut heap = BinaryHeap::with_capacity(n + 1);
    for item in items {
        heap.push(Reverse(item));
        if heap.len() > n {
            heap.pop();
        }
    }
    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(ranked)| ranked.value)
        .collect()
}
