//! Turns heterogeneous inbound payloads into [`LogRecord`] values.
//!
//! Producers have shipped the same concept under different names across
//! versions (`status` / `httpStatus` / `statusStr`, `service` / `serviceName`,
//! ...). Each canonical field has one priority list below; the first synonym
//! holding a non-empty, convertible value wins. Nothing here can fail: unknown
//! or malformed fields simply end up absent.
//!
//! Raw lines are parsed in order: JSON object → logfmt → plain text. A line
//! that only starts with `key=value` pairs keeps the whole line as its message
//! and reads its level the plain-text way.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use crate::config::NormalizerConfig;
use crate::signature;
use crate::types::{LogLevel, LogRecord, ProjectId, Throwable};

// ---------------------------------------------------------------------------
// Synonym priority tables
// ---------------------------------------------------------------------------

const PROJECT_ID: &[&str] = &["projectId", "project_id", "project"];
const TIMESTAMP: &[&str] = &["timestamp", "@timestamp", "ts", "time", "occurredAt"];
const LEVEL: &[&str] = &["level", "logLevel", "log.level", "severity", "lvl"];
const MESSAGE: &[&str] = &["message", "msg", "logMessage", "formattedMessage"];
const LOGGER: &[&str] = &["loggerName", "logger", "logger_name", "category"];
const ENVIRONMENT: &[&str] = &["environment", "env", "profile"];
const SERVICE: &[&str] = &["serviceName", "service", "service_name"];
const METHOD: &[&str] = &["requestMethod", "request.method", "method", "httpMethod"];
const URI: &[&str] = &["requestUri", "request.uri", "uri", "path", "url"];
const STATUS: &[&str] = &["httpStatus", "status", "statusStr", "statusCode"];
const DURATION: &[&str] = &[
    "durationMs",
    "duration",
    "elapsedMs",
    "latencyMs",
    "latency_ms",
    "responseTime",
];
const THROWABLE: &[&str] = &["throwable", "exception", "error"];

const THROWABLE_CLASS: &[&str] = &["className", "class", "type", "exceptionClass", "name"];
const THROWABLE_MESSAGE: &[&str] = &["message", "msg", "localizedMessage"];
const THROWABLE_FRAMES: &[&str] = &["stackTrace", "stack_trace", "stack", "frames"];
const THROWABLE_FINGERPRINT: &[&str] = &["fingerprint"];
const THROWABLE_CAUSE: &[&str] = &["cause"];

// Epoch values above this are milliseconds (year 5138 in seconds).
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)").expect("number pattern"));
static TEXT_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(TRACE|DEBUG|INFO|WARN(?:ING)?|ERROR|FATAL|CRITICAL)\b")
        .expect("level pattern")
});
static TEXT_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[?(\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)\]?",
    )
    .expect("timestamp pattern")
});
static LOGFMT_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_@][\w.@-]*=").expect("logfmt pattern"));

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Converts raw payloads into canonical records.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stack_frames: usize,
    max_cause_depth: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

impl Normalizer {
    pub fn new(cfg: &NormalizerConfig) -> Self {
        Self {
            stack_frames: cfg.stack_frames,
            max_cause_depth: cfg.max_cause_depth.max(1),
        }
    }

    /// Normalize a payload received now.
    pub fn normalize(&self, raw: &Value) -> LogRecord {
        self.normalize_at(raw, Utc::now())
    }

    /// Normalize a payload, using `received_at` when it carries no usable
    /// timestamp. Non-object payloads become a record whose message is the
    /// payload's text.
    pub fn normalize_at(&self, raw: &Value, received_at: DateTime<Utc>) -> LogRecord {
        let Some(obj) = raw.as_object() else {
            return LogRecord {
                message: as_text(raw),
                ..empty_record(raw.clone(), received_at)
            };
        };

        LogRecord {
            project_id: first(obj, PROJECT_ID, as_project_id).unwrap_or_default(),
            timestamp: first(obj, TIMESTAMP, as_timestamp).unwrap_or(received_at),
            level: first(obj, LEVEL, as_level).unwrap_or_default(),
            message: first(obj, MESSAGE, as_text),
            logger_name: first(obj, LOGGER, as_text),
            environment: first(obj, ENVIRONMENT, as_text),
            service_name: first(obj, SERVICE, as_text),
            request_method: first(obj, METHOD, as_text).map(|m| m.to_ascii_uppercase()),
            request_uri: first(obj, URI, as_text),
            http_status: first(obj, STATUS, as_status),
            duration_ms: first(obj, DURATION, as_millis),
            throwable: first(obj, THROWABLE, |v| self.throwable(v, 0)),
            raw: raw.clone(),
        }
    }

    /// Normalize a raw line received now.
    pub fn normalize_line(&self, line: &str) -> LogRecord {
        self.normalize_line_at(line, Utc::now())
    }

    /// Normalize a raw line: JSON object, then logfmt, then plain text.
    pub fn normalize_line_at(&self, line: &str, received_at: DateTime<Utc>) -> LogRecord {
        let trimmed = line.trim();

        if trimmed.starts_with('{') {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
                return self.normalize_at(&value, received_at);
            }
        }

        let raw = Value::String(line.to_string());

        if LOGFMT_START.is_match(trimmed) {
            let (pairs, has_prose) = parse_logfmt(trimmed);
            if !pairs.is_empty() {
                let has_level = first(&pairs, LEVEL, as_level).is_some();
                let mut record = LogRecord {
                    raw,
                    ..self.normalize_at(&Value::Object(pairs), received_at)
                };
                // `user=bob ERROR login failed`: the pairs are only a prefix.
                if has_prose || record.message.is_none() {
                    record.message = non_empty(trimmed);
                    if !has_level {
                        record.level = text_level(trimmed).unwrap_or_default();
                    }
                }
                return record;
            }
        }

        let timestamp = TEXT_TIMESTAMP
            .captures(trimmed)
            .and_then(|c| parse_timestamp_str(&c[1]))
            .unwrap_or(received_at);
        let level = text_level(trimmed).unwrap_or_default();

        LogRecord {
            timestamp,
            level,
            message: non_empty(trimmed),
            ..empty_record(raw, received_at)
        }
    }

    fn throwable(&self, value: &Value, depth: usize) -> Option<Throwable> {
        if depth >= self.max_cause_depth {
            return None;
        }

        let obj = match value {
            Value::Object(obj) => obj,
            // `"error": "connection refused"`: a bare message.
            other => {
                let message = as_text(other)?;
                return Some(Throwable {
                    stack_signature: signature::stack_signature(
                        None,
                        Some(&message),
                        &[],
                        self.stack_frames,
                    ),
                    class_name: None,
                    message: Some(message),
                    cause: None,
                });
            }
        };

        let class_name = first(obj, THROWABLE_CLASS, as_text);
        let message = first(obj, THROWABLE_MESSAGE, as_text);
        let frames = first(obj, THROWABLE_FRAMES, as_frames).unwrap_or_default();
        let fingerprint = first(obj, THROWABLE_FINGERPRINT, as_text);
        let cause = first(obj, THROWABLE_CAUSE, |v| self.throwable(v, depth + 1)).map(Box::new);

        if class_name.is_none() && message.is_none() && frames.is_empty() && fingerprint.is_none()
        {
            return cause.map(|c| *c);
        }

        let stack_signature = match &fingerprint {
            Some(fp) => signature::fingerprint_signature(fp),
            None => signature::stack_signature(
                class_name.as_deref(),
                message.as_deref(),
                &frames,
                self.stack_frames,
            ),
        };

        Some(Throwable {
            class_name,
            message,
            stack_signature,
            cause,
        })
    }
}

fn text_level(line: &str) -> Option<LogLevel> {
    TEXT_LEVEL
        .captures(line)
        .and_then(|c| LogLevel::parse_lenient(&c[1]))
}

fn empty_record(raw: Value, timestamp: DateTime<Utc>) -> LogRecord {
    LogRecord {
        project_id: ProjectId::default(),
        timestamp,
        level: LogLevel::default(),
        message: None,
        logger_name: None,
        environment: None,
        service_name: None,
        request_method: None,
        request_uri: None,
        http_status: None,
        duration_ms: None,
        throwable: None,
        raw,
    }
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

/// First synonym whose value is present and converts successfully.
fn first<T>(
    obj: &Map<String, Value>,
    keys: &[&str],
    convert: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    keys.iter()
        .filter_map(|key| lookup(obj, key))
        .find_map(convert)
}

/// Literal key first (`log.level`), then a dotted path into nested objects
/// (`request.method`). Empty values count as missing.
fn lookup<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = obj.get(key).filter(|v| is_present(v)) {
        return Some(value);
    }
    if !key.contains('.') {
        return None;
    }
    let mut parts = key.split('.');
    let mut current = obj.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    is_present(current).then_some(current)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

// ---------------------------------------------------------------------------
// Converters
// ---------------------------------------------------------------------------

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => LEADING_NUMBER
            .captures(s)
            .and_then(|c| c[1].parse::<f64>().ok()),
        _ => None,
    }
}

fn as_project_id(value: &Value) -> Option<ProjectId> {
    match value {
        Value::Number(n) => n.as_u64().map(ProjectId),
        Value::String(s) => s.trim().parse::<u64>().ok().map(ProjectId),
        _ => None,
    }
}

fn as_level(value: &Value) -> Option<LogLevel> {
    match value {
        Value::String(s) => LogLevel::parse_lenient(s),
        Value::Number(n) => LogLevel::parse_lenient(&n.to_string()),
        _ => None,
    }
}

fn as_status(value: &Value) -> Option<u16> {
    let n = as_number(value)?;
    (100.0..600.0).contains(&n).then_some(n as u16)
}

fn as_millis(value: &Value) -> Option<u64> {
    let n = as_number(value)?;
    (n.is_finite() && n >= 0.0).then(|| n.round() as u64)
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            parse_timestamp_str(s).or_else(|| s.trim().parse::<f64>().ok().and_then(from_epoch))
        }
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    // `+0900` offsets and space-separated dates with an offset.
    if let Some(ts) = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    let millis = if n > EPOCH_MILLIS_THRESHOLD { n } else { n * 1000.0 };
    DateTime::from_timestamp_millis(millis as i64)
}

/// Frames as an array of strings, an array of frame objects, or one
/// newline-separated trace string.
fn as_frames(value: &Value) -> Option<Vec<String>> {
    let frames: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(frame_text).collect(),
        Value::String(trace) => {
            let lines: Vec<&str> = trace.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
            let at_lines: Vec<String> = lines
                .iter()
                .filter_map(|l| l.strip_prefix("at "))
                .map(str::to_string)
                .collect();
            if at_lines.is_empty() {
                lines.into_iter().map(str::to_string).collect()
            } else {
                at_lines
            }
        }
        _ => return None,
    };
    (!frames.is_empty()).then_some(frames)
}

fn frame_text(frame: &Value) -> Option<String> {
    let Value::Object(obj) = frame else {
        return as_text(frame);
    };
    let class = first(obj, &["declaringClass", "className", "class"], as_text);
    let method = first(obj, &["methodName", "method", "function"], as_text);
    if class.is_none() && method.is_none() {
        return None;
    }
    let location = match (
        first(obj, &["fileName", "file"], as_text),
        first(obj, &["lineNumber", "line"], as_text),
    ) {
        (Some(file), Some(line)) => format!("({file}:{line})"),
        (Some(file), None) => format!("({file})"),
        _ => String::new(),
    };
    Some(format!(
        "{}.{}{}",
        class.unwrap_or_default(),
        method.unwrap_or_default(),
        location
    ))
}

// ---------------------------------------------------------------------------
// logfmt
// ---------------------------------------------------------------------------

/// Parse `key=value key2="quoted value"` pairs. Bare words without `=` are
/// skipped; the flag reports whether any were.
fn parse_logfmt(line: &str) -> (Map<String, Value>, bool) {
    let mut pairs = Map::new();
    let mut has_prose = false;
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            has_prose = true;
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                value.push(c);
            }
        }

        if !key.is_empty() {
            pairs.insert(key, Value::String(value));
        }
    }

    (pairs, has_prose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn logfmt_quoted_values_are_unquoted() {
        let (pairs, has_prose) = parse_logfmt(r#"level=warn msg="slow \"db\" query" duration_ms=4200 stray"#);
        assert_eq!(pairs.get("level"), Some(&json!("warn")));
        assert_eq!(pairs.get("msg"), Some(&json!(r#"slow "db" query"#)));
        assert_eq!(pairs.get("duration_ms"), Some(&json!("4200")));
        assert_eq!(pairs.len(), 3);
        assert!(has_prose);

        let (_, has_prose) = parse_logfmt("a=1 b=2");
        assert!(!has_prose);
    }

    #[test]
    fn compact_offsets_parse() {
        let compact = parse_timestamp_str("2024-01-15T19:00:05+0900").unwrap();
        let rfc = parse_timestamp_str("2024-01-15T10:00:05Z").unwrap();
        assert_eq!(compact, rfc);
        assert_eq!(parse_timestamp_str("2024-01-15 19:00:05.250+0900").unwrap().timestamp_subsec_millis(), 250);
    }

    #[test]
    fn dotted_lookup_reaches_nested_objects() {
        let obj = json!({"request": {"method": "post", "uri": "/orders"}});
        let record = Normalizer::default().normalize(&obj);
        assert_eq!(record.request_method.as_deref(), Some("POST"));
        assert_eq!(record.request_uri.as_deref(), Some("/orders"));
    }

    #[test]
    fn epoch_seconds_and_millis_agree() {
        let secs = as_timestamp(&json!(1_705_312_800)).unwrap();
        let millis = as_timestamp(&json!(1_705_312_800_000_u64)).unwrap();
        assert_eq!(secs, millis);
    }

    #[test]
    fn status_strings_keep_leading_code() {
        assert_eq!(as_status(&json!("503 Service Unavailable")), Some(503));
        assert_eq!(as_status(&json!("OK")), None);
        assert_eq!(as_status(&json!(42)), None);
    }

    #[test]
    fn cause_chain_is_bounded() {
        let mut nested = json!({"className": "Leaf", "message": "bottom"});
        for i in 0..20 {
            nested = json!({"className": format!("Wrapper{i}"), "cause": nested});
        }
        let normalizer = Normalizer::new(&NormalizerConfig {
            stack_frames: 5,
            max_cause_depth: 4,
        });
        let record = normalizer.normalize(&json!({"level": "ERROR", "throwable": nested}));
        assert_eq!(record.throwable.unwrap().chain().count(), 4);
    }
}
