//! Suspicious text content scanning.
//!
//! Applies only to text-like member extensions under a fixed byte cap.
//! Decoding is permissive and failures never fail the scan: a content check
//! is advisory, and a hostile member can always make itself undecodable.

use std::io::Read;

use crate::SecurityConfig;
use crate::report::SecurityScanResult;
use crate::report::SecurityThreat;
use crate::report::Severity;
use crate::report::ThreatType;

/// Only the first MiB of a member is examined.
pub(crate) const MAX_CONTENT_SCAN_BYTES: u64 = 1024 * 1024;

/// Extensions whose content is worth pattern-matching.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "text", "md", "html", "htm", "xml", "svg", "js", "mjs", "css", "json", "csv", "yaml",
    "yml", "ini", "cfg", "conf", "sh", "bat", "ps1", "php", "asp", "aspx", "jsp",
];

/// Whether a member qualifies for content scanning.
#[must_use]
pub(crate) fn is_scannable(name: &str, uncompressed_size: u64) -> bool {
    if uncompressed_size == 0 || uncompressed_size > MAX_CONTENT_SCAN_BYTES {
        return false;
    }
    name.rsplit('.')
        .next()
        .is_some_and(|ext| ext != name && TEXT_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)))
}

/// Scans one member's bytes for configured suspicious patterns.
///
/// Each match records one Medium `SuspiciousContent` finding. Read or decode
/// failures are logged at debug and swallowed.
pub(crate) fn scan_member<R: Read>(
    name: &str,
    reader: &mut R,
    config: &SecurityConfig,
    result: &mut SecurityScanResult,
) {
    let mut buf = Vec::new();
    if let Err(err) = reader.take(MAX_CONTENT_SCAN_BYTES).read_to_end(&mut buf) {
        tracing::debug!(member = name, error = %err, "content read failed, skipping");
        return;
    }

    // Lossy decode: invalid bytes are dropped, never surfaced.
    let text = String::from_utf8_lossy(&buf).to_lowercase();
    for pattern in &config.suspicious_content_patterns {
        if text.contains(&pattern.to_lowercase()) {
            result.record(
                SecurityThreat::new(
                    ThreatType::SuspiciousContent,
                    Severity::Medium,
                    format!("member '{name}' contains suspicious pattern '{pattern}'"),
                )
                .with_detail("member", name)
                .with_detail("pattern", pattern),
            );
        }
    }
}
