//! Tar container walk (plain, gzip, and bzip2 streams).

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;

use crate::SecurityConfig;
use crate::report::SecurityScanResult;
use crate::report::SecurityThreat;
use crate::report::Severity;
use crate::report::ThreatType;
use crate::scanner::content;
use crate::scanner::detect::ContainerKind;
use crate::scanner::entry::MemberInspector;

/// Scans a tar stream, decompressing according to the sniffed container
/// kind.
///
/// Tar exposes no per-member compressed sizes, so the per-member ratio check
/// is skipped and bomb detection relies on the aggregate ratio against the
/// archive's on-disk size.
pub(crate) fn scan_tar(
    path: &Path,
    kind: ContainerKind,
    config: &SecurityConfig,
    scan_content: bool,
    result: &mut SecurityScanResult,
) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(err) => {
            record_invalid(result, &format!("cannot open archive: {err}"));
            return;
        }
    };
    let on_disk_size = file.metadata().map_or(0, |m| m.len());
    let reader = BufReader::new(file);

    match kind {
        ContainerKind::TarGz => {
            walk_tar(GzDecoder::new(reader), on_disk_size, config, scan_content, result);
        }
        ContainerKind::TarBz2 => {
            walk_tar(BzDecoder::new(reader), on_disk_size, config, scan_content, result);
        }
        // Plain tar: the aggregate ratio degenerates to ~1 and stays quiet.
        _ => walk_tar(reader, on_disk_size, config, scan_content, result),
    }
}

fn walk_tar<R: Read>(
    reader: R,
    compressed_size: u64,
    config: &SecurityConfig,
    scan_content: bool,
    result: &mut SecurityScanResult,
) {
    let mut archive = tar::Archive::new(reader);
    let entries = match archive.entries() {
        Ok(entries) => entries,
        Err(err) => {
            record_invalid(result, &format!("corrupt tar container: {err}"));
            return;
        }
    };

    let mut inspector = MemberInspector::new(config, 0);
    let mut enumerated = 0usize;

    for entry in entries {
        let mut entry = match entry {
            Ok(e) => e,
            Err(err) => {
                // A mangled header poisons everything after it; stop here.
                record_invalid(result, &format!("corrupt tar member: {err}"));
                break;
            }
        };

        enumerated += 1;
        if enumerated > config.max_file_count {
            // Paying to iterate a huge listing is itself the attack, so
            // enumeration stops at the first over-ceiling member.
            MemberInspector::record_excessive_files(config, enumerated, result);
            result.total_files_scanned = enumerated;
            return;
        }

        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let uncompressed = entry.size();
        inspector.inspect_member(&name, uncompressed, None, result);

        let is_file = entry.header().entry_type().is_file();
        if scan_content && is_file && content::is_scannable(&name, uncompressed) {
            content::scan_member(&name, &mut entry, config, result);
        }
    }

    result.total_files_scanned = enumerated;
    inspector.finish(compressed_size, result);
}

fn record_invalid(result: &mut SecurityScanResult, message: &str) {
    result.record(SecurityThreat::new(
        ThreatType::InvalidArchive,
        Severity::High,
        message,
    ));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::field_reassign_with_default)]
mod tests {
    use super::*;
    use crate::test_utils;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_archive(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(data).unwrap();
        path
    }

    fn scan(path: &Path, kind: ContainerKind, config: &SecurityConfig) -> SecurityScanResult {
        let mut result = SecurityScanResult::new(Some(path));
        scan_tar(path, kind, config, true, &mut result);
        result
    }

    #[test]
    fn test_clean_tar_gz() {
        let temp = TempDir::new().unwrap();
        let data = test_utils::create_test_tar_gz(vec![("hello.txt", b"hi")]);
        let path = write_archive(&temp, "clean.tar.gz", &data);

        let result = scan(&path, ContainerKind::TarGz, &SecurityConfig::default());
        assert!(result.is_safe);
        assert!(result.threats.is_empty());
        assert_eq!(result.total_files_scanned, 1);
    }

    #[test]
    fn test_clean_plain_tar() {
        let temp = TempDir::new().unwrap();
        let data = test_utils::create_test_tar(vec![("a.txt", b"aaa"), ("b/c.txt", b"ccc")]);
        let path = write_archive(&temp, "clean.tar", &data);

        let result = scan(&path, ContainerKind::Tar, &SecurityConfig::default());
        assert!(result.is_safe);
        assert_eq!(result.total_files_scanned, 2);
        assert_eq!(result.total_size_scanned, 6);
    }

    #[test]
    fn test_traversal_member_in_tar() {
        let temp = TempDir::new().unwrap();
        let data = test_utils::create_test_tar(vec![("../../etc/passwd", b"root:x")]);
        let path = write_archive(&temp, "evil.tar", &data);

        let result = scan(&path, ContainerKind::Tar, &SecurityConfig::default());
        assert!(!result.is_safe);
        assert_eq!(result.count_of(ThreatType::PathTraversal), 1);
        assert_eq!(result.threats[0].severity, Severity::Critical);
    }

    #[test]
    fn test_member_count_ceiling_stops_enumeration() {
        let temp = TempDir::new().unwrap();
        let entries: Vec<(String, Vec<u8>)> =
            (0..20).map(|i| (format!("f{i}.txt"), b"x".to_vec())).collect();
        let borrowed: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(n, d)| (n.as_str(), d.as_slice()))
            .collect();
        let data = test_utils::create_test_tar(borrowed);
        let path = write_archive(&temp, "many.tar", &data);

        let mut config = SecurityConfig::default();
        config.max_file_count = 10;
        let result = scan(&path, ContainerKind::Tar, &config);
        assert!(!result.is_safe);
        assert_eq!(result.count_of(ThreatType::ExcessiveFiles), 1);
        // Enumeration halted at ceiling + 1, not the full listing.
        assert_eq!(result.total_files_scanned, 11);
    }

    #[test]
    fn test_corrupt_gzip_is_a_finding() {
        let temp = TempDir::new().unwrap();
        let path = write_archive(&temp, "broken.tar.gz", &[0x1F, 0x8B, 0x00, 0x11, 0x22]);

        let result = scan(&path, ContainerKind::TarGz, &SecurityConfig::default());
        assert!(!result.is_safe);
        assert!(result.count_of(ThreatType::InvalidArchive) >= 1);
    }

    #[test]
    fn test_tar_gz_aggregate_bomb() {
        let temp = TempDir::new().unwrap();
        // 5 MiB of a single repeated byte compresses to a few KiB.
        let blob = vec![0u8; 5 * 1024 * 1024];
        let data = test_utils::create_test_tar_gz(vec![("blob.bin", blob.as_slice())]);
        let path = write_archive(&temp, "bomb.tar.gz", &data);

        let result = scan(&path, ContainerKind::TarGz, &SecurityConfig::default());
        assert!(!result.is_safe);
        assert_eq!(result.count_of(ThreatType::ZipBomb), 1);
    }

    #[test]
    fn test_content_scan_in_tar() {
        let temp = TempDir::new().unwrap();
        let data = test_utils::create_test_tar(vec![("init.sh", b"#!/bin/sh\necho hi")]);
        let path = write_archive(&temp, "scripts.tar", &data);

        let result = scan(&path, ContainerKind::Tar, &SecurityConfig::default());
        assert_eq!(result.count_of(ThreatType::SuspiciousContent), 1);
        assert!(result.is_safe);
    }
}
