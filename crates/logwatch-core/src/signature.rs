//! Stable hashes that group "the same" exception.
//!
//! Messages and frames go through a light normalization pass first so that
//! request ids, counters and drifting line numbers do not split one error into
//! many groups: UUID-looking tokens become `<uuid>`, hex literals become
//! `<hex>`, and any remaining digit run becomes `<n>`.

use sha2::{Digest, Sha256};
use std::sync::LazyLock;

use regex::Regex;

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("uuid pattern")
});
static HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b0x[0-9a-f]+\b").expect("hex pattern"));
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern"));

/// Hex characters kept from the SHA-256 digest.
const SIGNATURE_LEN: usize = 16;

/// Replace volatile tokens with placeholders.
pub fn normalize_text(text: &str) -> String {
    let text = UUID.replace_all(text.trim(), "<uuid>");
    let text = HEX.replace_all(&text, "<hex>");
    DIGITS.replace_all(&text, "<n>").into_owned()
}

/// Signature of an exception from its class, message and leading frames.
/// Only the first `frame_limit` frames contribute.
pub fn stack_signature(
    class_name: Option<&str>,
    message: Option<&str>,
    frames: &[String],
    frame_limit: usize,
) -> String {
    let mut material = String::new();
    material.push_str(class_name.unwrap_or_default());
    material.push('|');
    material.push_str(&normalize_text(message.unwrap_or_default()));
    for frame in frames.iter().take(frame_limit) {
        material.push('|');
        material.push_str(&normalize_text(frame));
    }
    digest(&material)
}

/// Signature of a caller-supplied fingerprint. Used verbatim, no normalization.
pub fn fingerprint_signature(fingerprint: &str) -> String {
    digest(fingerprint)
}

/// Signature for error records that carry no throwable: grouped by message.
pub fn message_signature(message: &str) -> String {
    digest(&format!("message|{}", normalize_text(message)))
}

fn digest(material: &str) -> String {
    let mut hex = hex::encode(Sha256::digest(material.as_bytes()));
    hex.truncate(SIGNATURE_LEN);
    hex
}
