//! End-to-end scenarios across the scanner, limiter, and scratch manager.
//!
//! These tests exercise the full pipeline with real archives on a real
//! filesystem, the way the embedding upload service drives it.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::field_reassign_with_default
)]

use archvet_core::test_utils;
use archvet_core::FileSecurityScanner;
use archvet_core::OperationKind;
use archvet_core::ResourceLimiter;
use archvet_core::ResourceLimits;
use archvet_core::ScanError;
use archvet_core::ScratchConfig;
use archvet_core::SecureTempFileManager;
use archvet_core::SecurityConfig;
use archvet_core::Severity;
use archvet_core::ThreatType;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_archive(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, data).unwrap();
    path
}

#[test]
fn test_clean_single_member_archive() {
    let temp = TempDir::new().unwrap();
    let path = write_archive(
        &temp,
        "clean.zip",
        &test_utils::create_deflated_zip(vec![("hello.txt", b"hi")]),
    );

    let scanner = FileSecurityScanner::new(SecurityConfig::default());
    let result = scanner.scan(&path, true);

    assert!(result.is_safe);
    assert!(result.threats.is_empty());
    assert_eq!(result.total_files_scanned, 1);
    assert_eq!(result.source, Some(path));
}

#[test]
fn test_traversal_member_yields_one_critical_finding() {
    let temp = TempDir::new().unwrap();
    let path = write_archive(
        &temp,
        "evil.zip",
        &test_utils::create_test_zip(vec![("../../etc/passwd", b"root:x:0:0")]),
    );

    let scanner = FileSecurityScanner::new(SecurityConfig::default());
    let result = scanner.scan(&path, true);

    assert!(!result.is_safe);
    let traversals: Vec<_> = result
        .threats
        .iter()
        .filter(|t| t.threat_type == ThreatType::PathTraversal)
        .collect();
    assert_eq!(traversals.len(), 1);
    assert_eq!(traversals[0].severity, Severity::Critical);
    assert!(traversals[0].message.contains("../../etc/passwd"));
}

#[test]
fn test_zip_bomb_reports_ratio_over_ceiling() {
    let temp = TempDir::new().unwrap();
    // 50 MiB of a single repeated byte compresses to well under 1 MiB.
    let path = write_archive(
        &temp,
        "bomb.zip",
        &test_utils::create_zip_bomb("payload.bin", 50 * 1024 * 1024),
    );

    let mut config = SecurityConfig::default();
    config.max_file_size = 100 * 1024 * 1024; // isolate the ratio check
    let scanner = FileSecurityScanner::new(config);
    let result = scanner.scan(&path, true);

    assert!(!result.is_safe);
    let bomb = result
        .threats
        .iter()
        .find(|t| t.threat_type == ThreatType::ZipBomb)
        .expect("zip bomb finding expected");
    assert_eq!(bomb.severity, Severity::Critical);
    let ratio: f64 = bomb.details.get("ratio").unwrap().parse().unwrap();
    assert!(ratio > 100.0, "reported ratio {ratio} should exceed ceiling");
}

#[test]
fn test_excessive_member_count() {
    let temp = TempDir::new().unwrap();
    let entries: Vec<(String, Vec<u8>)> = (0..1_500)
        .map(|i| (format!("member{i}.txt"), b"x".to_vec()))
        .collect();
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    let path = write_archive(&temp, "many.zip", &test_utils::create_test_zip(borrowed));

    let mut config = SecurityConfig::default();
    config.max_file_count = 1_000;
    let scanner = FileSecurityScanner::new(config);
    let result = scanner.scan(&path, true);

    assert!(!result.is_safe);
    assert_eq!(result.count_of(ThreatType::ExcessiveFiles), 1);
    assert_eq!(result.threats.len(), 1, "per-member work must be abandoned");
    assert_eq!(result.total_files_scanned, 1_500);
}

#[test]
fn test_member_count_exactly_at_ceiling_passes() {
    let temp = TempDir::new().unwrap();
    let entries: Vec<(String, Vec<u8>)> = (0..50)
        .map(|i| (format!("member{i}.txt"), b"x".to_vec()))
        .collect();
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    let path = write_archive(&temp, "exact.zip", &test_utils::create_test_zip(borrowed));

    let mut config = SecurityConfig::default();
    config.max_file_count = 50;
    let scanner = FileSecurityScanner::new(config);
    assert!(scanner.scan(&path, true).is_safe);
}

#[test]
fn test_job_scoped_scratch_lifecycle() {
    let root = TempDir::new().unwrap();
    let manager = SecureTempFileManager::new(ScratchConfig {
        base_dir: root.path().join("scratch"),
        cleanup_on_drop: false,
        ..Default::default()
    })
    .unwrap();

    let before = manager.tracked_count();
    let staged = manager.create_temp_directory(Some("J1"), None).unwrap();
    fs::write(staged.join("upload.zip"), b"bytes").unwrap();

    let removed = manager.cleanup_job_files("J1");
    assert_eq!(removed, 1);
    assert!(!staged.exists());
    assert_eq!(manager.tracked_count(), before);
}

#[test]
fn test_concurrency_ceiling_raises_before_work() {
    let mut limits = ResourceLimits::default();
    limits.max_concurrent_uploads = 3;
    let limiter = ResourceLimiter::new(limits);

    let _guards: Vec<_> = (0..3)
        .map(|_| limiter.track_operation(OperationKind::Upload).unwrap())
        .collect();

    let denied = limiter.track_operation(OperationKind::Upload);
    assert!(matches!(denied, Err(ScanError::LimitExceeded { .. })));
}

#[test]
fn test_scan_then_extract_through_choke_point() {
    // The full staging flow: scratch dir, scan, per-member path validation.
    let root = TempDir::new().unwrap();
    let manager = SecureTempFileManager::new(ScratchConfig {
        base_dir: root.path().join("scratch"),
        cleanup_on_drop: false,
        ..Default::default()
    })
    .unwrap();
    let scanner = FileSecurityScanner::new(SecurityConfig::default());

    let staging = manager.create_temp_directory(Some("job-7"), None).unwrap();
    let archive = staging.join("upload.zip");
    fs::write(
        &archive,
        test_utils::create_test_zip(vec![("docs/a.txt", b"alpha"), ("docs/b.txt", b"beta")]),
    )
    .unwrap();

    let result = scanner.scan(&archive, true);
    assert!(result.is_safe);

    let extract_dir = staging.join("extracted");
    fs::create_dir(&extract_dir).unwrap();
    for member in ["docs/a.txt", "docs/b.txt"] {
        let dest = scanner
            .validate_extraction_path(&extract_dir, Path::new(member))
            .unwrap();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"content").unwrap();
    }

    // A hostile member never reaches the write.
    let hostile = scanner.validate_extraction_path(&extract_dir, Path::new("../../../etc/cron.d/x"));
    assert!(matches!(hostile, Err(ScanError::PathTraversal { .. })));

    assert_eq!(manager.cleanup_job_files("job-7"), 1);
    assert!(!staging.exists());
}

#[test]
fn test_scan_inside_limiter_scope() {
    let temp = TempDir::new().unwrap();
    let path = write_archive(
        &temp,
        "clean.zip",
        &test_utils::create_test_zip(vec![("a.txt", b"x")]),
    );

    let limits = ResourceLimits {
        max_memory_mb: 1024 * 1024,
        max_disk_mb: 1024 * 1024,
        max_processing_seconds: 1_000_000,
        max_open_files: 1_000_000,
        max_cpu_seconds: 1_000_000,
        ..Default::default()
    };
    let limiter = ResourceLimiter::new(limits);
    let scanner = FileSecurityScanner::new(SecurityConfig::default());

    let guard = limiter.track_operation(OperationKind::Upload).unwrap();
    let result = scanner.scan(&path, true);
    assert!(result.is_safe);
    guard.complete().unwrap();
}
