//! Static payload corpora used across harnesses.
//!
//! The JSON corpus deliberately spells the same concepts under different
//! producer-era field names.

use serde_json::{json, Value};

use super::builders::{at, RecordBuilder};
use logwatch::{LogLevel, LogRecord};

/// Raw JSON lines in assorted producer shapes.
pub const CORPUS_JSON: &[&str] = &[
    r#"{"projectId":1,"timestamp":"2024-01-15T10:00:00Z","level":"INFO","message":"Server started"}"#,
    r#"{"project_id":"1","@timestamp":"2024-01-15T10:00:01Z","severity":"ERROR","msg":"Connection refused","error":{"className":"java.net.ConnectException","message":"Connection refused"}}"#,
    r#"{"project":1,"ts":1705312802,"lvl":"warning","logMessage":"Slow query","durationMs":"4200ms"}"#,
    r#"{"projectId":1,"time":"2024-01-15 10:00:03","logLevel":"debug","message":"Cache miss","env":"prod"}"#,
    r#"{"projectId":1,"timestamp":1705312804000,"level":"fatal","message":"Out of memory","serviceName":"api"}"#,
    r#"{"projectId":1,"timestamp":"2024-01-15T10:00:05Z","level":"INFO","requestMethod":"post","requestUri":"/api/v1/payments","statusStr":"201 Created","latencyMs":47}"#,
];

/// logfmt lines.
pub const CORPUS_LOGFMT: &[&str] = &[
    r#"projectId=2 ts=2024-01-15T10:00:00Z level=info msg="Server started""#,
    r#"projectId=2 ts=2024-01-15T10:00:01Z level=error msg="Connection refused" env=prod"#,
    r#"projectId=2 ts=2024-01-15T10:00:02Z level=warn method=GET path=/healthz status=503 latency_ms=12"#,
];

/// Lines with no structure at all.
pub const CORPUS_PLAIN: &[&str] = &[
    "2024-01-15 10:00:00 INFO  Starting application version 2.4.1",
    "[2024-01-15T10:00:03Z] WARN: Disk usage at 92% on /dev/sda1",
    "ERROR: NullPointerException at com.example.App.handle(App.java:42)",
    "GET /api/v1/users 200 47ms",
];

/// The same exception thrown twice, differing only in volatile details.
pub fn repeated_exception(request_id: &str, line: u32) -> Value {
    json!({
        "projectId": 1,
        "level": "ERROR",
        "message": format!("request {request_id} failed"),
        "throwable": {
            "className": "java.sql.SQLTimeoutException",
            "message": format!("query timed out after 30000 ms (request {request_id})"),
            "stackTrace": [
                format!("com.example.db.Pool.acquire(Pool.java:{line})"),
                "com.example.api.Items.list(Items.java:88)"
            ]
        }
    })
}

/// 100 records for project 1 spread evenly over two hours: ten ERRORs sharing
/// one signature, and five timed `GET /items` calls.
pub fn two_hour_window() -> Vec<LogRecord> {
    const GET_ITEMS_MS: [u64; 5] = [50, 60, 70, 5000, 80];

    (0..100)
        .map(|i| {
            let ts = at(i * 72);
            let builder = RecordBuilder::new(1, &format!("event {i}")).at(ts);
            let builder = match i {
                i if i % 10 == 0 => builder.level(LogLevel::Error).throwable(
                    "java.lang.IllegalStateException",
                    "pool exhausted",
                    "feedc0de00000001",
                ),
                i if i % 10 == 5 && i / 10 < 5 => {
                    builder.http("GET", "/items", 200, GET_ITEMS_MS[(i / 10) as usize])
                }
                _ => builder,
            };
            builder.build()
        })
        .collect()
}
