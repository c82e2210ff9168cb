//! Threat records and scan results.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

/// Category of a detected threat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreatType {
    /// Compression ratio indicates a decompression bomb.
    ZipBomb,
    /// Member path escapes the extraction directory.
    PathTraversal,
    /// Member count exceeds the configured ceiling.
    ExcessiveFiles,
    /// Member or total size exceeds the configured ceiling.
    ExcessiveSize,
    /// Archive nested inside the scanned archive.
    NestedArchive,
    /// Content matches a suspicious pattern or an unexpected extension.
    SuspiciousContent,
    /// Container is corrupt, unreadable, or missing.
    InvalidArchive,
    /// A resource ceiling was hit while scanning.
    ResourceLimit,
}

impl std::fmt::Display for ThreatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ZipBomb => "zip_bomb",
            Self::PathTraversal => "path_traversal",
            Self::ExcessiveFiles => "excessive_files",
            Self::ExcessiveSize => "excessive_size",
            Self::NestedArchive => "nested_archive",
            Self::SuspiciousContent => "suspicious_content",
            Self::InvalidArchive => "invalid_archive",
            Self::ResourceLimit => "resource_limit",
        };
        f.write_str(name)
    }
}

/// Severity of a detected threat, ordered from least to most severe.
///
/// A scan result stays safe only while every recorded threat is below
/// [`Severity::High`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Advisory only.
    Low,
    /// Worth surfacing; caller policy decides.
    Medium,
    /// Unsafe to extract.
    High,
    /// Active attack indicator.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// A single detected threat. Immutable once recorded on a result.
#[derive(Debug, Clone)]
pub struct SecurityThreat {
    /// Threat category.
    pub threat_type: ThreatType,
    /// How dangerous the finding is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Open key/value map of finding-specific details.
    pub details: BTreeMap<String, String>,
    /// When the threat was detected.
    pub detected_at: SystemTime,
}

impl SecurityThreat {
    /// Creates a new threat record.
    #[must_use]
    pub fn new(threat_type: ThreatType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            threat_type,
            severity,
            message: message.into(),
            details: BTreeMap::new(),
            detected_at: SystemTime::now(),
        }
    }

    /// Attaches a detail entry, builder style.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Complete inventory of findings from one top-level scan.
///
/// Invariant: `is_safe` is `true` iff no contained threat has severity
/// [`Severity::High`] or above. Recording such a threat flips it false for
/// the remainder of the scan, never back.
#[derive(Debug, Clone)]
pub struct SecurityScanResult {
    /// Whether the archive is safe to extract.
    pub is_safe: bool,
    /// Detected threats, in detection order.
    pub threats: Vec<SecurityThreat>,
    /// When the scan started.
    pub scanned_at: SystemTime,
    /// Path or filename hint of the scanned input, when known.
    pub source: Option<PathBuf>,
    /// Number of members enumerated.
    pub total_files_scanned: usize,
    /// Sum of declared uncompressed member sizes, in bytes.
    pub total_size_scanned: u64,
}

impl SecurityScanResult {
    /// Creates an empty, safe result for the given source.
    #[must_use]
    pub fn new(source: Option<&Path>) -> Self {
        Self {
            is_safe: true,
            threats: Vec::new(),
            scanned_at: SystemTime::now(),
            source: source.map(Path::to_path_buf),
            total_files_scanned: 0,
            total_size_scanned: 0,
        }
    }

    /// Records a threat, flipping `is_safe` permanently when the severity is
    /// High or Critical.
    pub fn record(&mut self, threat: SecurityThreat) {
        if threat.severity >= Severity::High {
            self.is_safe = false;
        }
        self.threats.push(threat);
    }

    /// Returns the most severe recorded threat level, if any.
    #[must_use]
    pub fn highest_severity(&self) -> Option<Severity> {
        self.threats.iter().map(|t| t.severity).max()
    }

    /// Iterates threats at or above the given severity, for caller policy
    /// that tolerates some findings.
    pub fn threats_at_least(&self, severity: Severity) -> impl Iterator<Item = &SecurityThreat> {
        self.threats.iter().filter(move |t| t.severity >= severity)
    }

    /// Returns how many threats of the given type were recorded.
    #[must_use]
    pub fn count_of(&self, threat_type: ThreatType) -> usize {
        self.threats
            .iter()
            .filter(|t| t.threat_type == threat_type)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_result_is_safe() {
        let result = SecurityScanResult::new(None);
        assert!(result.is_safe);
        assert!(result.threats.is_empty());
        assert_eq!(result.highest_severity(), None);
    }

    #[test]
    fn test_low_and_medium_keep_result_safe() {
        let mut result = SecurityScanResult::new(None);
        result.record(SecurityThreat::new(
            ThreatType::SuspiciousContent,
            Severity::Low,
            "advisory",
        ));
        result.record(SecurityThreat::new(
            ThreatType::SuspiciousContent,
            Severity::Medium,
            "script tag",
        ));
        assert!(result.is_safe);
        assert_eq!(result.highest_severity(), Some(Severity::Medium));
    }

    #[test]
    fn test_high_threat_flips_permanently() {
        let mut result = SecurityScanResult::new(None);
        result.record(SecurityThreat::new(
            ThreatType::ExcessiveSize,
            Severity::High,
            "too big",
        ));
        assert!(!result.is_safe);

        // A later benign finding must not flip it back.
        result.record(SecurityThreat::new(
            ThreatType::SuspiciousContent,
            Severity::Low,
            "advisory",
        ));
        assert!(!result.is_safe);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_threats_at_least_filters() {
        let mut result = SecurityScanResult::new(None);
        result.record(SecurityThreat::new(
            ThreatType::SuspiciousContent,
            Severity::Medium,
            "a",
        ));
        result.record(SecurityThreat::new(
            ThreatType::ZipBomb,
            Severity::Critical,
            "b",
        ));
        assert_eq!(result.threats_at_least(Severity::High).count(), 1);
        assert_eq!(result.count_of(ThreatType::ZipBomb), 1);
    }

    #[test]
    fn test_threat_details_builder() {
        let threat = SecurityThreat::new(ThreatType::ZipBomb, Severity::Critical, "bomb")
            .with_detail("ratio", "250.0")
            .with_detail("member", "data.bin");
        assert_eq!(threat.details.get("ratio").map(String::as_str), Some("250.0"));
        assert_eq!(threat.details.len(), 2);
    }
}
