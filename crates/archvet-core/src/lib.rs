//! Security perimeter for untrusted archive uploads.
//!
//! `archvet-core` inspects, bounds, and stages attacker-controlled archive
//! files before a downstream pipeline is allowed to touch them. It provides
//! three cooperating services:
//!
//! - [`FileSecurityScanner`]: detects decompression bombs, path traversal,
//!   oversized or over-numerous members, nested archives, and suspicious
//!   text content, reporting findings as data instead of errors.
//! - [`ResourceLimiter`]: measures and bounds memory, disk, CPU, wall-clock
//!   time, and concurrent operation slots.
//! - [`SecureTempFileManager`]: the only sanctioned source of writable
//!   scratch space, with tracked, idempotent, eventually-guaranteed
//!   reclamation.
//!
//! # Examples
//!
//! ```no_run
//! use archvet_core::{FileSecurityScanner, SecurityConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scanner = FileSecurityScanner::new(SecurityConfig::default());
//! let result = scanner.scan("upload.zip".as_ref(), true);
//! if result.is_safe {
//!     println!("scanned {} members", result.total_files_scanned);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod limits;
pub mod report;
pub mod scanner;
pub mod scratch;
pub mod test_utils;

pub use config::SecurityConfig;
pub use error::LimitResource;
pub use error::Result;
pub use error::ScanError;
pub use limits::OperationGuard;
pub use limits::OperationKind;
pub use limits::ResourceLimiter;
pub use limits::ResourceLimits;
pub use limits::TimeLimit;
pub use limits::usage::ResourceUsage;
pub use report::SecurityScanResult;
pub use report::SecurityThreat;
pub use report::Severity;
pub use report::ThreatType;
pub use scanner::FileSecurityScanner;
pub use scratch::ScratchConfig;
pub use scratch::ScratchGuard;
pub use scratch::ScratchStats;
pub use scratch::SecureTempFileManager;
pub use scratch::TempFileInfo;
pub use scratch::sweep::SweepHandle;
