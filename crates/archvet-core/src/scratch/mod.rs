//! Tracked scratch storage with guaranteed eventual reclamation.

pub mod sweep;

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::SystemTime;

use crate::Result;

/// Configuration for a [`SecureTempFileManager`].
#[derive(Debug, Clone)]
pub struct ScratchConfig {
    /// Base directory under which all scratch entries live.
    pub base_dir: PathBuf,
    /// Name prefix for allocated entries.
    pub prefix: String,
    /// Age past which tracked and orphaned entries are swept.
    pub max_age: Duration,
    /// Interval between background sweeps.
    pub sweep_interval: Duration,
    /// Advisory ceiling on total scratch size in bytes.
    pub max_total_bytes: u64,
    /// Reclaim everything tracked when the manager is dropped.
    pub cleanup_on_drop: bool,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("archvet"),
            prefix: "archvet_".to_string(),
            max_age: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            max_total_bytes: 10 * 1024 * 1024 * 1024, // 10 GiB
            cleanup_on_drop: true,
        }
    }
}

/// One tracked scratch entry.
#[derive(Debug, Clone)]
pub struct TempFileInfo {
    /// Absolute path of the entry.
    pub path: PathBuf,
    /// When the entry was allocated.
    pub created_at: SystemTime,
    /// Job the entry belongs to, when scoped.
    pub job_id: Option<String>,
    /// Size in bytes at allocation time.
    pub size_bytes: u64,
    /// Whether the entry is a directory.
    pub is_directory: bool,
}

/// Read-only snapshot of scratch state for monitoring.
#[derive(Debug, Clone)]
pub struct ScratchStats {
    /// Tracked file entries.
    pub tracked_files: usize,
    /// Tracked directory entries.
    pub tracked_directories: usize,
    /// Actual on-disk size of the base directory in bytes.
    pub total_size_bytes: u64,
    /// The base directory.
    pub base_dir: PathBuf,
}

/// The only sanctioned source of writable scratch space.
///
/// Every allocated path is a descendant of one base directory, named
/// `<prefix><job-id>_<random-suffix>`, created owner-only, and recorded in
/// an in-memory tracking table. Cleanup is idempotent and never propagates
/// I/O failures, so one stuck entry cannot block reclamation of the rest of
/// a batch. Because tracking is in-memory, entries whose record was lost to
/// a crash are recovered by the orphan sweep.
///
/// Construct explicitly and pass handles where needed; independent
/// instances (e.g. in tests) have fully independent state.
///
/// # Examples
///
/// ```
/// use archvet_core::{ScratchConfig, SecureTempFileManager};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ScratchConfig {
///     base_dir: std::env::temp_dir().join("archvet-doc"),
///     ..Default::default()
/// };
/// let manager = SecureTempFileManager::new(config)?;
/// let dir = manager.create_temp_directory(Some("job-1"), None)?;
/// // ... stage the upload under `dir` ...
/// assert_eq!(manager.cleanup_job_files("job-1"), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SecureTempFileManager {
    config: ScratchConfig,
    tracked: Mutex<HashMap<PathBuf, TempFileInfo>>,
}

impl SecureTempFileManager {
    /// Creates a manager, creating the base directory (owner-only on unix)
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the base directory cannot be created.
    pub fn new(config: ScratchConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.base_dir)?;
        restrict_permissions(&config.base_dir, 0o700)?;
        Ok(Self {
            config,
            tracked: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    /// Allocates a uniquely named scratch directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn create_temp_directory(
        &self,
        job_id: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<PathBuf> {
        let stem = self.entry_stem(job_id, prefix);
        let dir = tempfile::Builder::new()
            .prefix(&stem)
            .rand_bytes(8)
            .tempdir_in(&self.config.base_dir)?;
        let path = dir.keep();
        restrict_permissions(&path, 0o700)?;
        self.track(&path, job_id, true);
        tracing::debug!(path = %path.display(), "allocated scratch directory");
        Ok(path)
    }

    /// Allocates a uniquely named scratch file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created.
    pub fn create_temp_file(
        &self,
        job_id: Option<&str>,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> Result<PathBuf> {
        let stem = self.entry_stem(job_id, prefix);
        let file = tempfile::Builder::new()
            .prefix(&stem)
            .suffix(suffix.unwrap_or(""))
            .rand_bytes(8)
            .tempfile_in(&self.config.base_dir)?;
        let (_, path) = file.keep().map_err(|err| err.error)?;
        restrict_permissions(&path, 0o600)?;
        self.track(&path, job_id, false);
        tracing::debug!(path = %path.display(), "allocated scratch file");
        Ok(path)
    }

    /// Scoped variant of [`create_temp_directory`](Self::create_temp_directory):
    /// the returned guard reclaims the directory on every exit path.
    ///
    /// # Errors
    ///
    /// Same as the non-scoped variant.
    pub fn temp_directory(&self, job_id: Option<&str>) -> Result<ScratchGuard<'_>> {
        let path = self.create_temp_directory(job_id, None)?;
        Ok(ScratchGuard {
            manager: self,
            path,
            is_directory: true,
        })
    }

    /// Scoped variant of [`create_temp_file`](Self::create_temp_file).
    ///
    /// # Errors
    ///
    /// Same as the non-scoped variant.
    pub fn temp_file(&self, job_id: Option<&str>) -> Result<ScratchGuard<'_>> {
        let path = self.create_temp_file(job_id, None, None)?;
        Ok(ScratchGuard {
            manager: self,
            path,
            is_directory: false,
        })
    }

    /// Removes a tracked scratch file. Idempotent: a missing target counts
    /// as already clean. I/O failures are logged and reported as `false`,
    /// never propagated.
    pub fn cleanup_file(&self, path: &Path) -> bool {
        self.cleanup_entry(path, false)
    }

    /// Removes a tracked scratch directory and its contents. Same contract
    /// as [`cleanup_file`](Self::cleanup_file).
    pub fn cleanup_directory(&self, path: &Path) -> bool {
        self.cleanup_entry(path, true)
    }

    /// Removes every entry tracked under a job. Returns how many entries
    /// were reclaimed. The primary per-request reclamation path.
    pub fn cleanup_job_files(&self, job_id: &str) -> usize {
        let targets: Vec<(PathBuf, bool)> = {
            let tracked = lock(&self.tracked);
            tracked
                .values()
                .filter(|info| info.job_id.as_deref() == Some(job_id))
                .map(|info| (info.path.clone(), info.is_directory))
                .collect()
        };
        targets
            .into_iter()
            .filter(|(path, is_dir)| self.cleanup_entry(path, *is_dir))
            .count()
    }

    /// Removes tracked entries older than the cutoff, then sweeps the base
    /// directory for orphaned entries past the same cutoff. Returns the
    /// number of entries reclaimed.
    ///
    /// The orphan sweep recovers entries whose tracking record was lost,
    /// e.g. after a process restart.
    pub fn cleanup_old_files(&self, max_age: Option<Duration>) -> usize {
        let age = max_age.unwrap_or(self.config.max_age);
        let cutoff = SystemTime::now().checked_sub(age);
        let Some(cutoff) = cutoff else { return 0 };

        let stale: Vec<(PathBuf, bool)> = {
            let tracked = lock(&self.tracked);
            tracked
                .values()
                .filter(|info| info.created_at < cutoff)
                .map(|info| (info.path.clone(), info.is_directory))
                .collect()
        };
        let mut removed = stale
            .into_iter()
            .filter(|(path, is_dir)| self.cleanup_entry(path, *is_dir))
            .count();

        for orphan in self.find_orphaned_files() {
            let old_enough = std::fs::metadata(&orphan)
                .and_then(|meta| meta.modified())
                .is_ok_and(|modified| modified < cutoff);
            if !old_enough {
                continue;
            }
            let is_dir = orphan.is_dir();
            if self.remove_from_disk(&orphan, is_dir) {
                tracing::info!(path = %orphan.display(), "reclaimed orphaned scratch entry");
                removed += 1;
            }
        }
        removed
    }

    /// Entries present under the base directory but absent from the
    /// tracking table.
    #[must_use]
    pub fn find_orphaned_files(&self) -> Vec<PathBuf> {
        let children = match std::fs::read_dir(&self.config.base_dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "cannot list scratch base directory");
                return Vec::new();
            }
        };
        let tracked = lock(&self.tracked);
        children
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| !tracked.contains_key(path))
            .collect()
    }

    /// Unconditionally reclaims everything tracked. Returns the number of
    /// entries removed. Run automatically at drop when configured.
    pub fn cleanup_all(&self) -> usize {
        let targets: Vec<(PathBuf, bool)> = {
            let tracked = lock(&self.tracked);
            tracked
                .values()
                .map(|info| (info.path.clone(), info.is_directory))
                .collect()
        };
        targets
            .into_iter()
            .filter(|(path, is_dir)| self.cleanup_entry(path, *is_dir))
            .count()
    }

    /// Number of currently tracked entries.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        lock(&self.tracked).len()
    }

    /// Read-only snapshot for monitoring.
    #[must_use]
    pub fn stats(&self) -> ScratchStats {
        let (tracked_files, tracked_directories) = {
            let tracked = lock(&self.tracked);
            let dirs = tracked.values().filter(|info| info.is_directory).count();
            (tracked.len() - dirs, dirs)
        };
        ScratchStats {
            tracked_files,
            tracked_directories,
            total_size_bytes: self.total_size(),
            base_dir: self.config.base_dir.clone(),
        }
    }

    /// Actual recursive on-disk size of the base directory in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        walkdir::WalkDir::new(&self.config.base_dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }

    /// Whether `additional_bytes` would stay under the advisory scratch
    /// ceiling.
    #[must_use]
    pub fn has_room(&self, additional_bytes: u64) -> bool {
        self.total_size().saturating_add(additional_bytes) <= self.config.max_total_bytes
    }

    pub(crate) fn config(&self) -> &ScratchConfig {
        &self.config
    }

    fn entry_stem(&self, job_id: Option<&str>, prefix: Option<&str>) -> String {
        let prefix = prefix.unwrap_or(&self.config.prefix);
        job_id.map_or_else(|| prefix.to_string(), |job| format!("{prefix}{job}_"))
    }

    fn track(&self, path: &Path, job_id: Option<&str>, is_directory: bool) {
        let info = TempFileInfo {
            path: path.to_path_buf(),
            created_at: SystemTime::now(),
            job_id: job_id.map(str::to_string),
            size_bytes: std::fs::metadata(path).map_or(0, |meta| meta.len()),
            is_directory,
        };
        lock(&self.tracked).insert(path.to_path_buf(), info);
    }

    fn cleanup_entry(&self, path: &Path, is_directory: bool) -> bool {
        // Only paths under the base directory are ever touched.
        if !path.starts_with(&self.config.base_dir) {
            tracing::warn!(path = %path.display(), "refusing cleanup outside base directory");
            return false;
        }
        if !path.exists() {
            // Already clean; drop any stale tracking record.
            lock(&self.tracked).remove(path);
            return true;
        }
        if self.remove_from_disk(path, is_directory) {
            lock(&self.tracked).remove(path);
            true
        } else {
            false
        }
    }

    fn remove_from_disk(&self, path: &Path, is_directory: bool) -> bool {
        let outcome = if is_directory {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        match outcome {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "scratch cleanup failed");
                false
            }
        }
    }
}

impl Drop for SecureTempFileManager {
    fn drop(&mut self) {
        if self.config.cleanup_on_drop {
            let removed = self.cleanup_all();
            if removed > 0 {
                tracing::debug!(removed, "reclaimed tracked scratch entries at shutdown");
            }
        }
    }
}

/// Scoped scratch entry; Drop reclaims it on every exit path.
#[derive(Debug)]
pub struct ScratchGuard<'a> {
    manager: &'a SecureTempFileManager,
    path: PathBuf,
    is_directory: bool,
}

impl ScratchGuard<'_> {
    /// Path of the guarded entry.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        if self.is_directory {
            self.manager.cleanup_directory(&self.path);
        } else {
            self.manager.cleanup_file(&self.path);
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn restrict_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
