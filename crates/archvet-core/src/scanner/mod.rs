//! The archive threat-detection engine.

pub mod content;
pub mod detect;
mod entry;
pub mod path;
mod tar;
mod zip;

use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::Result;
use crate::SecurityConfig;
use crate::report::SecurityScanResult;
use crate::report::SecurityThreat;
use crate::report::Severity;
use crate::report::ThreatType;
use detect::ContainerKind;

pub use path::validate_extraction_path;

/// Decides whether an archive is safe to extract, producing a complete
/// inventory of detected threats.
///
/// The scanner is stateless beyond its immutable configuration: instances
/// are cheap to share between threads, and every scan owns its own result.
/// Scanning never raises because the input is hostile: corrupt containers,
/// traversal attempts, and bombs are all reported as findings. Only
/// [`validate_extraction_path`], the direct-use safety choke point, raises.
///
/// # Examples
///
/// ```no_run
/// use archvet_core::{FileSecurityScanner, SecurityConfig, Severity};
///
/// let scanner = FileSecurityScanner::new(SecurityConfig::default());
/// let result = scanner.scan("upload.zip".as_ref(), true);
/// if !result.is_safe {
///     for threat in result.threats_at_least(Severity::High) {
///         eprintln!("{}: {}", threat.threat_type, threat.message);
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileSecurityScanner {
    config: SecurityConfig,
}

impl Default for FileSecurityScanner {
    fn default() -> Self {
        Self::new(SecurityConfig::default())
    }
}

impl FileSecurityScanner {
    /// Creates a scanner with the given configuration snapshot.
    #[must_use]
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Scans an archive on disk.
    ///
    /// A missing file is reported as a High `InvalidArchive` finding, not an
    /// error. When `scan_content` is false, member bytes are never read;
    /// only structure and metadata are inspected.
    #[must_use]
    pub fn scan(&self, archive_path: &Path, scan_content: bool) -> SecurityScanResult {
        let mut result = SecurityScanResult::new(Some(archive_path));
        if !archive_path.is_file() {
            result.record(
                SecurityThreat::new(
                    ThreatType::InvalidArchive,
                    Severity::High,
                    format!("archive does not exist: {}", archive_path.display()),
                )
                .with_detail("path", archive_path.display().to_string()),
            );
            return result;
        }
        let label = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.scan_staged(archive_path, &label, scan_content, &mut result);
        result
    }

    /// Scans an in-memory upload stream.
    ///
    /// The stream is buffered to throwaway storage and run through the same
    /// pipeline as [`scan`](Self::scan), with `filename` supplying the
    /// extension for the allow-list check. The stream's read position is
    /// restored on every exit path.
    ///
    /// # Errors
    ///
    /// Returns an error only for staging I/O failures (seek, copy); hostile
    /// archive bytes are findings, never errors.
    pub fn scan_upload<R: Read + Seek>(
        &self,
        stream: &mut R,
        filename: &str,
        scan_content: bool,
    ) -> Result<SecurityScanResult> {
        let origin = stream.stream_position()?;
        stream.seek(SeekFrom::Start(0))?;

        let outcome = self.stage_and_scan(stream, filename, scan_content);

        // Restore the caller's position regardless of the scan outcome.
        let restore = stream.seek(SeekFrom::Start(origin));
        let mut result = outcome?;
        restore?;
        result.source = Some(PathBuf::from(filename));
        Ok(result)
    }

    /// Validates a member's declared relative path against a target
    /// directory and returns the resolved destination.
    ///
    /// Callers MUST route every (target, member) pair through this before
    /// writing a byte, or the traversal class this subsystem exists to
    /// prevent reappears downstream.
    ///
    /// # Errors
    ///
    /// See [`validate_extraction_path`].
    pub fn validate_extraction_path(
        &self,
        target_dir: &Path,
        member_path: &Path,
    ) -> Result<PathBuf> {
        path::validate_extraction_path(target_dir, member_path)
    }

    fn stage_and_scan<R: Read>(
        &self,
        stream: &mut R,
        filename: &str,
        scan_content: bool,
    ) -> Result<SecurityScanResult> {
        let mut staged = tempfile::NamedTempFile::new()?;
        std::io::copy(stream, staged.as_file_mut())?;
        staged.as_file_mut().flush()?;

        let mut result = SecurityScanResult::new(None);
        self.scan_staged(staged.path(), filename, scan_content, &mut result);
        Ok(result)
    }

    /// The shared pipeline: extension allow-list, magic-byte sniff, then
    /// dispatch to the container-specific walk.
    fn scan_staged(
        &self,
        staged_path: &Path,
        label: &str,
        scan_content: bool,
        result: &mut SecurityScanResult,
    ) {
        let extension = label.rsplit('.').next().filter(|ext| *ext != label);
        let allowed = extension.is_some_and(|ext| self.config.is_extension_allowed(ext));
        if !allowed && !self.config.allowed_extensions.is_empty() {
            result.record(
                SecurityThreat::new(
                    ThreatType::SuspiciousContent,
                    Severity::Medium,
                    format!("file extension of '{label}' is not on the allow-list"),
                )
                .with_detail("filename", label)
                .with_detail("extension", extension.unwrap_or("")),
            );
            return;
        }

        let kind = match detect::sniff_container(staged_path) {
            Ok(kind) => kind,
            Err(err) => {
                result.record(SecurityThreat::new(
                    ThreatType::InvalidArchive,
                    Severity::High,
                    format!("cannot read archive header: {err}"),
                ));
                return;
            }
        };

        match kind {
            ContainerKind::Zip => zip::scan_zip(staged_path, &self.config, scan_content, result),
            ContainerKind::TarGz | ContainerKind::TarBz2 | ContainerKind::Tar => {
                tar::scan_tar(staged_path, kind, &self.config, scan_content, result);
            }
            ContainerKind::Unknown => {
                result.record(
                    SecurityThreat::new(
                        ThreatType::InvalidArchive,
                        Severity::Low,
                        format!("container type of '{label}' not recognized, skipping structural scan"),
                    )
                    .with_detail("filename", label),
                );
            }
        }
    }
}
