//! Error types for the scanning subsystem.
//!
//! Threat findings are NOT errors; they travel inside a
//! [`SecurityScanResult`](crate::report::SecurityScanResult). Errors are
//! reserved for caller contract violations (path traversal at the extraction
//! choke point) and breached operating ceilings.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ScanError`.
pub type Result<T> = std::result::Result<T, ScanError>;

/// A specific resource ceiling that was breached, carrying the observed
/// value and the configured limit.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitResource {
    /// Process memory ceiling exceeded.
    Memory {
        /// Observed memory use in MiB.
        current_mb: f64,
        /// Configured ceiling in MiB.
        max_mb: u64,
    },
    /// Scratch disk usage ceiling exceeded.
    Disk {
        /// Observed disk use in MiB.
        current_mb: f64,
        /// Configured ceiling in MiB.
        max_mb: u64,
    },
    /// Wall-clock processing time ceiling exceeded.
    ProcessingTime {
        /// Elapsed seconds.
        elapsed_seconds: f64,
        /// Configured ceiling in seconds.
        max_seconds: u64,
    },
    /// Open file handle ceiling exceeded.
    OpenFiles {
        /// Observed open handle count.
        current: usize,
        /// Configured ceiling.
        max: usize,
    },
    /// Accumulated CPU time ceiling exceeded.
    CpuTime {
        /// Observed CPU seconds.
        current_seconds: f64,
        /// Configured ceiling in seconds.
        max_seconds: u64,
    },
    /// Concurrent upload slot ceiling reached.
    ConcurrentUploads {
        /// Slots currently held.
        current: usize,
        /// Configured ceiling.
        max: usize,
    },
    /// Concurrent extraction slot ceiling reached.
    ConcurrentExtractions {
        /// Slots currently held.
        current: usize,
        /// Configured ceiling.
        max: usize,
    },
}

impl LimitResource {
    /// Short resource name for logs and operational alerting.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Disk { .. } => "disk",
            Self::ProcessingTime { .. } => "processing_time",
            Self::OpenFiles { .. } => "open_files",
            Self::CpuTime { .. } => "cpu_time",
            Self::ConcurrentUploads { .. } => "concurrent_uploads",
            Self::ConcurrentExtractions { .. } => "concurrent_extractions",
        }
    }

    /// Whether the caller can reasonably retry later.
    ///
    /// Concurrency and time ceilings clear on their own; memory and disk
    /// ceilings usually call for outright rejection.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProcessingTime { .. }
                | Self::ConcurrentUploads { .. }
                | Self::ConcurrentExtractions { .. }
        )
    }
}

impl std::fmt::Display for LimitResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory { current_mb, max_mb } => {
                write!(f, "memory ({current_mb:.1} MiB > {max_mb} MiB)")
            }
            Self::Disk { current_mb, max_mb } => {
                write!(f, "disk ({current_mb:.1} MiB > {max_mb} MiB)")
            }
            Self::ProcessingTime {
                elapsed_seconds,
                max_seconds,
            } => {
                write!(f, "processing time ({elapsed_seconds:.1}s > {max_seconds}s)")
            }
            Self::OpenFiles { current, max } => {
                write!(f, "open files ({current} > {max})")
            }
            Self::CpuTime {
                current_seconds,
                max_seconds,
            } => {
                write!(f, "cpu time ({current_seconds:.1}s > {max_seconds}s)")
            }
            Self::ConcurrentUploads { current, max } => {
                write!(f, "concurrent uploads ({current} >= {max})")
            }
            Self::ConcurrentExtractions { current, max } => {
                write!(f, "concurrent extractions ({current} >= {max})")
            }
        }
    }
}

/// Errors raised by the scanning subsystem.
#[derive(Error, Debug)]
pub enum ScanError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Path traversal attempt detected at the extraction choke point.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The member path that attempted traversal.
        path: PathBuf,
    },

    /// The extraction target directory is missing or not resolvable.
    #[error("invalid extraction target directory: {path}")]
    InvalidTargetDir {
        /// The target directory that failed to resolve.
        path: PathBuf,
    },

    /// A resource ceiling was breached.
    #[error("resource limit exceeded: {resource}")]
    LimitExceeded {
        /// The breached resource with observed and configured values.
        resource: LimitResource,
    },
}

impl ScanError {
    /// Returns `true` if this error represents a security-contract violation
    /// rather than an environmental failure.
    #[must_use]
    pub fn is_security_violation(&self) -> bool {
        matches!(self, Self::PathTraversal { .. })
    }
}
