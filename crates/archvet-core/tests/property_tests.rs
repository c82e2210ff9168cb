//! Property-based tests over generated member names and findings.

#![allow(clippy::unwrap_used)]

use archvet_core::test_utils;
use archvet_core::FileSecurityScanner;
use archvet_core::SecurityConfig;
use archvet_core::SecurityScanResult;
use archvet_core::SecurityThreat;
use archvet_core::Severity;
use archvet_core::ThreatType;
use proptest::prelude::*;
use std::io::Cursor;

/// Path segments that collide with the default blocked-substring list.
const RESERVED_SEGMENTS: &[&str] = &["etc", "proc", "sys", "dev"];

fn segment() -> impl Strategy<Value = String> {
    "[a-z]{2,8}".prop_filter("reserved segment", |s| {
        !RESERVED_SEGMENTS.contains(&s.as_str())
    })
}

fn safe_member_name() -> impl Strategy<Value = String> {
    (proptest::collection::vec(segment(), 1..4), segment())
        .prop_map(|(dirs, stem)| format!("{}/{stem}.txt", dirs.join("/")))
}

fn hostile_member_name() -> impl Strategy<Value = String> {
    (segment(), 1..4usize, segment()).prop_map(|(dir, hops, stem)| {
        let climb = vec![".."; hops].join("/");
        format!("{dir}/{climb}/{stem}.txt")
    })
}

fn scan_bytes(data: &[u8]) -> SecurityScanResult {
    let scanner = FileSecurityScanner::new(SecurityConfig::default());
    scanner
        .scan_upload(&mut Cursor::new(data), "upload.zip", true)
        .unwrap()
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

proptest! {
    #[test]
    fn parent_segments_always_flagged_critical(name in hostile_member_name()) {
        let zip = test_utils::create_test_zip(vec![(name.as_str(), b"data".as_slice())]);
        let result = scan_bytes(&zip);

        prop_assert!(!result.is_safe);
        let traversal = result
            .threats
            .iter()
            .find(|t| t.threat_type == ThreatType::PathTraversal);
        prop_assert!(traversal.is_some());
        prop_assert_eq!(traversal.unwrap().severity, Severity::Critical);
    }

    #[test]
    fn safe_member_names_stay_safe(names in proptest::collection::vec(safe_member_name(), 1..8)) {
        let entries: Vec<(&str, &[u8])> = names
            .iter()
            .map(|n| (n.as_str(), b"data".as_slice()))
            .collect();
        let zip = test_utils::create_test_zip(entries);
        let result = scan_bytes(&zip);

        prop_assert!(result.is_safe, "unexpected findings: {:?}", result.threats);
    }

    #[test]
    fn is_safe_tracks_high_severity_findings(
        findings in proptest::collection::vec(severity_strategy(), 0..12)
    ) {
        let mut result = SecurityScanResult::new(None);
        for severity in &findings {
            result.record(SecurityThreat::new(
                ThreatType::SuspiciousContent,
                *severity,
                "generated finding",
            ));
        }

        let any_high = findings.iter().any(|s| *s >= Severity::High);
        prop_assert_eq!(result.is_safe, !any_high);
        prop_assert_eq!(result.threats.len(), findings.len());
    }
}
