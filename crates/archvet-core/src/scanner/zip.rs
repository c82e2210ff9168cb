//! ZIP/JAR container walk.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::SecurityConfig;
use crate::report::SecurityScanResult;
use crate::report::SecurityThreat;
use crate::report::Severity;
use crate::report::ThreatType;
use crate::scanner::content;
use crate::scanner::entry::MemberInspector;

/// Scans a ZIP container, appending findings in central-directory order.
///
/// The member count is known up front from the central directory, so an
/// over-ceiling archive is rejected before any per-member work is paid for.
pub(crate) fn scan_zip(
    path: &Path,
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

    let mut archive = match zip::ZipArchive::new(BufReader::new(file)) {
        Ok(a) => a,
        Err(err) => {
            record_invalid(result, &format!("corrupt zip container: {err}"));
            return;
        }
    };

    let count = archive.len();
    result.total_files_scanned = count;
    if count > config.max_file_count {
        MemberInspector::record_excessive_files(config, count, result);
        return;
    }

    let mut inspector = MemberInspector::new(config, 0);
    for index in 0..count {
        let mut member = match archive.by_index(index) {
            Ok(m) => m,
            Err(err) => {
                record_invalid(result, &format!("unreadable member at index {index}: {err}"));
                continue;
            }
        };

        let name = member.name().to_owned();
        let uncompressed = member.size();
        let compressed = member.compressed_size();
        inspector.inspect_member(&name, uncompressed, Some(compressed), result);

        if scan_content && !member.is_dir() && content::is_scannable(&name, uncompressed) {
            content::scan_member(&name, &mut member, config, result);
        }
    }

    inspector.finish(0, result);
}

fn record_invalid(result: &mut SecurityScanResult, message: &str) {
    result.record(SecurityThreat::new(
        ThreatType::InvalidArchive,
        Severity::High,
        message,
    ));
}
