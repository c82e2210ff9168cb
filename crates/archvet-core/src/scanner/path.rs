//! The extraction path-safety choke point.
//!
//! Every member about to be written to disk must pass through
//! [`validate_extraction_path`] first. Unlike the scan itself, which reports
//! threats as data, this function raises: a rejected path here means the
//! caller is about to violate the extraction contract.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::Result;
use crate::ScanError;

/// Validates that a member path stays inside the target directory and
/// returns the resolved destination path.
///
/// # Validation Steps
///
/// 1. Canonicalize `target_dir` (it must exist).
/// 2. Reject absolute member paths.
/// 3. Reject any `..` component; skip `.` components while normalizing.
/// 4. Join onto the target and verify the resolved path (including a
///    canonicalized parent, to defeat symlinked intermediate directories)
///    stays inside the target.
///
/// # Errors
///
/// - [`ScanError::InvalidTargetDir`] when the target cannot be resolved.
/// - [`ScanError::PathTraversal`] for absolute paths, `..` components, or a
///   resolved path escaping the target.
///
/// # Examples
///
/// ```
/// use archvet_core::scanner::validate_extraction_path;
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let target = std::env::temp_dir();
/// let dest = validate_extraction_path(&target, Path::new("docs/readme.txt"))?;
/// assert!(dest.starts_with(&target.canonicalize()?));
///
/// assert!(validate_extraction_path(&target, Path::new("../escape.txt")).is_err());
/// # Ok(())
/// # }
/// ```
pub fn validate_extraction_path(target_dir: &Path, member_path: &Path) -> Result<PathBuf> {
    let target = target_dir
        .canonicalize()
        .map_err(|_| ScanError::InvalidTargetDir {
            path: target_dir.to_path_buf(),
        })?;

    if member_path.is_absolute() {
        return Err(ScanError::PathTraversal {
            path: member_path.to_path_buf(),
        });
    }

    let mut normalized = PathBuf::new();
    for component in member_path.components() {
        match component {
            Component::ParentDir => {
                return Err(ScanError::PathTraversal {
                    path: member_path.to_path_buf(),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ScanError::PathTraversal {
                    path: member_path.to_path_buf(),
                });
            }
            Component::CurDir => {}
            Component::Normal(part) => normalized.push(part),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(ScanError::PathTraversal {
            path: member_path.to_path_buf(),
        });
    }

    let resolved = target.join(&normalized);

    // Canonicalize the nearest existing ancestor so a symlinked intermediate
    // directory cannot redirect the write outside the target.
    if let Some(parent) = resolved.parent() {
        match parent.canonicalize() {
            Ok(canonical_parent) => {
                if !canonical_parent.starts_with(&target) {
                    return Err(ScanError::PathTraversal {
                        path: member_path.to_path_buf(),
                    });
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Parent not created yet; the prefix check below still holds.
            }
            Err(e) => return Err(ScanError::Io(e)),
        }
    }

    match resolved.canonicalize() {
        Ok(canonical) => {
            if !canonical.starts_with(&target) {
                return Err(ScanError::PathTraversal {
                    path: member_path.to_path_buf(),
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if !resolved.starts_with(&target) {
                return Err(ScanError::PathTraversal {
                    path: member_path.to_path_buf(),
                });
            }
        }
        Err(e) => return Err(ScanError::Io(e)),
    }

    Ok(resolved)
}
