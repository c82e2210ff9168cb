//! Per-member security checks shared by all container walkers.

use crate::SecurityConfig;
use crate::report::SecurityScanResult;
use crate::report::SecurityThreat;
use crate::report::Severity;
use crate::report::ThreatType;
use crate::scanner::detect;

/// Runs the uniform per-member check sequence and accumulates running
/// totals for the post-loop aggregate checks.
///
/// One inspector instance lives for the duration of one container walk.
/// Findings are appended to the result in member-enumeration order.
pub(crate) struct MemberInspector<'a> {
    config: &'a SecurityConfig,
    nesting_depth: usize,
    total_uncompressed: u64,
    total_compressed: u64,
}

impl<'a> MemberInspector<'a> {
    pub(crate) fn new(config: &'a SecurityConfig, nesting_depth: usize) -> Self {
        Self {
            config,
            nesting_depth,
            total_uncompressed: 0,
            total_compressed: 0,
        }
    }

    /// Checks one member: path traversal, sizes, per-member compression
    /// ratio, and nested-archive flagging.
    ///
    /// `compressed` is `None` for containers that do not expose per-member
    /// compressed sizes (tar streams); those members skip the ratio check.
    pub(crate) fn inspect_member(
        &mut self,
        name: &str,
        uncompressed: u64,
        compressed: Option<u64>,
        result: &mut SecurityScanResult,
    ) {
        self.check_member_path(name, result);

        self.total_uncompressed = self.total_uncompressed.saturating_add(uncompressed);
        if let Some(c) = compressed {
            self.total_compressed = self.total_compressed.saturating_add(c);
        }

        if uncompressed > self.config.max_file_size {
            result.record(
                SecurityThreat::new(
                    ThreatType::ExcessiveSize,
                    Severity::High,
                    format!("member '{name}' declares {uncompressed} bytes"),
                )
                .with_detail("member", name)
                .with_detail("size", uncompressed.to_string())
                .with_detail("limit", self.config.max_file_size.to_string()),
            );
        }

        // Skip the ratio when either size is zero: empty and stored members
        // would otherwise divide by zero or false-positive.
        if let Some(c) = compressed
            && c > 0
            && uncompressed > 0
        {
            let ratio = uncompressed as f64 / c as f64;
            if ratio > self.config.max_compression_ratio {
                result.record(
                    SecurityThreat::new(
                        ThreatType::ZipBomb,
                        Severity::Critical,
                        format!("member '{name}' compression ratio {ratio:.1} exceeds ceiling"),
                    )
                    .with_detail("member", name)
                    .with_detail("ratio", format!("{ratio:.1}"))
                    .with_detail("limit", format!("{:.1}", self.config.max_compression_ratio)),
                );
            }
        }

        if detect::is_archive_extension(name)
            && self.nesting_depth + 1 >= self.config.max_nesting_depth
        {
            result.record(
                SecurityThreat::new(
                    ThreatType::NestedArchive,
                    Severity::High,
                    format!("member '{name}' is a nested archive at maximum depth"),
                )
                .with_detail("member", name)
                .with_detail("depth", (self.nesting_depth + 1).to_string()),
            );
        }
    }

    /// Emits the over-ceiling member-count finding.
    pub(crate) fn record_excessive_files(
        config: &SecurityConfig,
        enumerated: usize,
        result: &mut SecurityScanResult,
    ) {
        result.record(
            SecurityThreat::new(
                ThreatType::ExcessiveFiles,
                Severity::High,
                format!(
                    "archive contains {enumerated} members, ceiling is {}",
                    config.max_file_count
                ),
            )
            .with_detail("count", enumerated.to_string())
            .with_detail("limit", config.max_file_count.to_string()),
        );
    }

    /// Post-loop aggregate checks: total uncompressed size and the aggregate
    /// compression ratio, which catches bombs assembled from many
    /// individually-innocuous members.
    ///
    /// `compressed_fallback` supplies the container's on-disk size for
    /// formats without per-member compressed sizes.
    pub(crate) fn finish(self, compressed_fallback: u64, result: &mut SecurityScanResult) {
        result.total_size_scanned = self.total_uncompressed;

        if self.total_uncompressed > self.config.max_total_size {
            result.record(
                SecurityThreat::new(
                    ThreatType::ExcessiveSize,
                    Severity::High,
                    format!(
                        "total declared size {} bytes exceeds ceiling {}",
                        self.total_uncompressed, self.config.max_total_size
                    ),
                )
                .with_detail("total_size", self.total_uncompressed.to_string())
                .with_detail("limit", self.config.max_total_size.to_string()),
            );
        }

        let compressed = if self.total_compressed > 0 {
            self.total_compressed
        } else {
            compressed_fallback
        };
        if compressed > 0 && self.total_uncompressed > 0 {
            let ratio = self.total_uncompressed as f64 / compressed as f64;
            if ratio > self.config.max_compression_ratio {
                result.record(
                    SecurityThreat::new(
                        ThreatType::ZipBomb,
                        Severity::Critical,
                        format!("aggregate compression ratio {ratio:.1} exceeds ceiling"),
                    )
                    .with_detail("ratio", format!("{ratio:.1}"))
                    .with_detail("total_uncompressed", self.total_uncompressed.to_string())
                    .with_detail("total_compressed", compressed.to_string()),
                );
            }
        }
    }

    /// Path checks: absolute paths and `..` segments are Critical; blocklist
    /// substring hits are High. At most one finding per member, with the
    /// traversal check taking precedence over the blocklist.
    fn check_member_path(&self, name: &str, result: &mut SecurityScanResult) {
        let absolute = is_absolute_member(name);
        let dotdot = has_parent_segment(name);

        if dotdot || (absolute && !self.config.allow_absolute_paths) {
            let reason = if dotdot { "parent-directory segment" } else { "absolute path" };
            result.record(
                SecurityThreat::new(
                    ThreatType::PathTraversal,
                    Severity::Critical,
                    format!("member '{name}' uses {reason}"),
                )
                .with_detail("member", name),
            );
        } else if let Some(blocked) = self.config.blocked_substring_in(name) {
            result.record(
                SecurityThreat::new(
                    ThreatType::PathTraversal,
                    Severity::High,
                    format!("member '{name}' matches blocked path pattern '{blocked}'"),
                )
                .with_detail("member", name)
                .with_detail("pattern", blocked),
            );
        }
    }
}

/// Whether a raw member name is absolute on any platform convention.
fn is_absolute_member(name: &str) -> bool {
    if name.starts_with('/') || name.starts_with('\\') {
        return true;
    }
    // Windows drive prefix, e.g. "C:\" or "C:/"
    let bytes = name.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Whether a raw member name contains a `..` segment on either separator.
fn has_parent_segment(name: &str) -> bool {
    name.split(['/', '\\']).any(|seg| seg == "..")
}
