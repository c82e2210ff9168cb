//! Best-effort resource usage sampling.
//!
//! Every sample is computed fresh; nothing is cached across calls. A metric
//! the platform cannot supply degrades to zero and is logged at debug; a
//! monitoring gap must never become an availability outage for the scan.

use std::path::Path;
use std::time::SystemTime;

use sysinfo::ProcessesToUpdate;
use sysinfo::System;

/// A point-in-time measurement of the current process and its scratch disk.
#[derive(Debug, Clone)]
pub struct ResourceUsage {
    /// Resident memory of this process in MiB.
    pub memory_mb: f64,
    /// Recursive size of the watched scratch directory in MiB.
    pub disk_mb: f64,
    /// Open file descriptors held by this process.
    pub open_files: usize,
    /// Accumulated CPU time of this process in seconds.
    pub cpu_time_seconds: f64,
    /// Elapsed wall-clock time of the active tracking interval in seconds.
    pub processing_time_seconds: f64,
    /// When the sample was taken.
    pub timestamp: SystemTime,
}

/// Samples memory (MiB) and accumulated CPU time (seconds) for the current
/// process.
pub(crate) fn sample_process() -> (f64, f64) {
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(err) => {
            tracing::debug!(error = %err, "cannot resolve current pid, degrading to zero");
            return (0.0, 0.0);
        }
    };

    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid).map_or_else(
        || {
            tracing::debug!("process sample unavailable, degrading to zero");
            (0.0, 0.0)
        },
        |process| {
            let memory_mb = process.memory() as f64 / (1024.0 * 1024.0);
            let cpu_seconds = process.accumulated_cpu_time() as f64 / 1000.0;
            (memory_mb, cpu_seconds)
        },
    )
}

/// Counts open file descriptors for the current process.
#[cfg(target_os = "linux")]
pub(crate) fn open_file_count() -> usize {
    match std::fs::read_dir("/proc/self/fd") {
        Ok(entries) => entries.count(),
        Err(err) => {
            tracing::debug!(error = %err, "cannot read /proc/self/fd, degrading to zero");
            0
        }
    }
}

/// Counts open file descriptors for the current process.
///
/// Not available on this platform; degrades to zero.
#[cfg(not(target_os = "linux"))]
pub(crate) fn open_file_count() -> usize {
    0
}

/// Recursive size of a directory in MiB; zero when unset or unreadable.
pub(crate) fn directory_size_mb(dir: Option<&Path>) -> f64 {
    let Some(dir) = dir else {
        return 0.0;
    };
    let bytes: u64 = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum();
    bytes as f64 / (1024.0 * 1024.0)
}

/// Free space in MiB on the disk holding `path`, matched by the longest
/// mount-point prefix. `None` when no disk matches.
pub(crate) fn free_space_mb(path: &Path) -> Option<f64> {
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|disk| resolved.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space() as f64 / (1024.0 * 1024.0))
}
