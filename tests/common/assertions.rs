//! Domain-specific assertions for logwatch harnesses.
//!
//! These wrap `pretty_assertions` and say which report or record invariant
//! was violated instead of just printing two unequal values.

use logwatch::{LogRecord, Report};

// ---------------------------------------------------------------------------
// Record assertions
// ---------------------------------------------------------------------------

/// Assert a record's level.
///
/// ```rust
/// assert_level!(record, LogLevel::Error);
/// ```
#[macro_export]
macro_rules! assert_level {
    ($record:expr, $level:expr) => {{
        let record: &logwatch::LogRecord = &$record;
        if record.level != $level {
            panic!(
                "assert_level! failed:\n  expected: {:?}\n  actual:   {:?}\n  raw: {}",
                $level, record.level, record.raw
            );
        }
    }};
}

/// No optional text field of a normalized record may hold an empty string.
pub fn assert_no_empty_fields(record: &LogRecord) {
    let fields = [
        ("message", &record.message),
        ("logger_name", &record.logger_name),
        ("environment", &record.environment),
        ("service_name", &record.service_name),
        ("request_method", &record.request_method),
        ("request_uri", &record.request_uri),
    ];
    for (name, value) in fields {
        if let Some(v) = value {
            assert!(
                !v.trim().is_empty(),
                "field {name} is present but empty\n  raw: {}",
                record.raw
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Report assertions
// ---------------------------------------------------------------------------

/// Distribution sums to exactly 100 when anything was counted, 0 otherwise.
pub fn assert_distribution_total(report: &Report) {
    let sum: u32 = report.log_level_distribution.values().sum();
    let expected = if report.total() > 0 { 100 } else { 0 };
    assert_eq!(
        sum, expected,
        "distribution sums to {sum}: {:?} (counts {:?})",
        report.log_level_distribution, report.total_log_counts
    );
}

/// topErrors ordered by count desc, then lastSeen desc.
pub fn assert_top_errors_sorted(report: &Report) {
    for pair in report.top_errors.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            (a.occurrence_count, a.last_seen) >= (b.occurrence_count, b.last_seen),
            "topErrors out of order:\n  {a:?}\n  before\n  {b:?}"
        );
    }
}

/// slowBackendApis ordered by p95 desc, then average desc.
pub fn assert_slow_apis_sorted(report: &Report) {
    for pair in report.slow_backend_apis.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.p95_ms > b.p95_ms || (a.p95_ms == b.p95_ms && a.average_ms >= b.average_ms),
            "slowBackendApis out of order:\n  {a:?}\n  before\n  {b:?}"
        );
    }
}
