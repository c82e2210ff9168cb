//! Resource measurement and ceilings.

pub mod usage;

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;
use std::time::SystemTime;

use crate::LimitResource;
use crate::Result;
use crate::ScanError;
use usage::ResourceUsage;

/// Resource ceilings. Configuration only; the limiter holds the state.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Process memory ceiling in MiB.
    pub max_memory_mb: u64,
    /// Scratch disk usage ceiling in MiB.
    pub max_disk_mb: u64,
    /// Wall-clock ceiling for one tracked operation, in seconds.
    pub max_processing_seconds: u64,
    /// Concurrent upload slots.
    pub max_concurrent_uploads: usize,
    /// Concurrent extraction slots.
    pub max_concurrent_extractions: usize,
    /// Open file handle ceiling.
    pub max_open_files: usize,
    /// Accumulated CPU time ceiling in seconds.
    pub max_cpu_seconds: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_mb: 512,
            max_disk_mb: 2048,
            max_processing_seconds: 300,
            max_concurrent_uploads: 5,
            max_concurrent_extractions: 3,
            max_open_files: 100,
            max_cpu_seconds: 120,
        }
    }
}

/// Kinds of operations admitted through the concurrency gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Staging an incoming upload.
    Upload,
    /// Extracting a scanned archive.
    Extraction,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => f.write_str("upload"),
            Self::Extraction => f.write_str("extraction"),
        }
    }
}

#[derive(Debug, Default)]
struct Slots {
    uploads: usize,
    extractions: usize,
}

/// Measures and bounds memory, disk, CPU, wall-clock time, and concurrent
/// operation slots.
///
/// Concurrency is the only dimension cheap to pre-check without doing work,
/// so it is enforced on entry; memory, disk, and time are detected after the
/// fact by [`check_limits`](Self::check_limits). Mutexes guard only the
/// short admission and interval updates, never the protected work itself.
///
/// Construct one limiter per scope of enforcement and pass handles
/// explicitly; tests build independent instances with independent state.
///
/// # Examples
///
/// ```
/// use archvet_core::{OperationKind, ResourceLimiter, ResourceLimits};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = ResourceLimiter::new(ResourceLimits::default());
/// let guard = limiter.track_operation(OperationKind::Upload)?;
/// // ... stage the upload ...
/// guard.complete()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ResourceLimiter {
    limits: ResourceLimits,
    watched_dir: Option<PathBuf>,
    slots: Mutex<Slots>,
    started: Mutex<Option<Instant>>,
}

impl ResourceLimiter {
    /// Creates a limiter with the given ceilings.
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            watched_dir: None,
            slots: Mutex::new(Slots::default()),
            started: Mutex::new(None),
        }
    }

    /// Sets the directory whose recursive size feeds the disk measurement.
    #[must_use]
    pub fn with_watched_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.watched_dir = Some(dir.into());
        self
    }

    /// Returns the configured ceilings.
    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Takes a fresh point-in-time usage sample.
    ///
    /// Best-effort: any metric the platform cannot supply degrades to zero
    /// rather than failing the call. Samples are never cached.
    #[must_use]
    pub fn current_usage(&self) -> ResourceUsage {
        let (memory_mb, cpu_time_seconds) = usage::sample_process();
        ResourceUsage {
            memory_mb,
            disk_mb: usage::directory_size_mb(self.watched_dir.as_deref()),
            open_files: usage::open_file_count(),
            cpu_time_seconds,
            processing_time_seconds: self.elapsed().map_or(0.0, |d| d.as_secs_f64()),
            timestamp: SystemTime::now(),
        }
    }

    /// Compares a fresh sample against the ceilings in fixed order (memory,
    /// disk, processing time, open files, CPU) and raises on the first
    /// violation.
    ///
    /// # Errors
    ///
    /// [`ScanError::LimitExceeded`] carrying the breached resource with its
    /// observed and configured values.
    pub fn check_limits(&self) -> Result<()> {
        let sample = self.current_usage();

        if sample.memory_mb > self.limits.max_memory_mb as f64 {
            return Err(limit(LimitResource::Memory {
                current_mb: sample.memory_mb,
                max_mb: self.limits.max_memory_mb,
            }));
        }
        if sample.disk_mb > self.limits.max_disk_mb as f64 {
            return Err(limit(LimitResource::Disk {
                current_mb: sample.disk_mb,
                max_mb: self.limits.max_disk_mb,
            }));
        }
        if sample.processing_time_seconds > self.limits.max_processing_seconds as f64 {
            return Err(limit(LimitResource::ProcessingTime {
                elapsed_seconds: sample.processing_time_seconds,
                max_seconds: self.limits.max_processing_seconds,
            }));
        }
        if sample.open_files > self.limits.max_open_files {
            return Err(limit(LimitResource::OpenFiles {
                current: sample.open_files,
                max: self.limits.max_open_files,
            }));
        }
        if sample.cpu_time_seconds > self.limits.max_cpu_seconds as f64 {
            return Err(limit(LimitResource::CpuTime {
                current_seconds: sample.cpu_time_seconds,
                max_seconds: self.limits.max_cpu_seconds,
            }));
        }
        Ok(())
    }

    /// Admits one operation of the given kind, raising before any work
    /// starts when the concurrency ceiling is already reached.
    ///
    /// The returned guard releases the slot on every exit path. Call
    /// [`OperationGuard::complete`] to also run the post-hoc limits check;
    /// plain Drop can only log a violation, since Drop cannot raise.
    ///
    /// Admission also starts the tracking interval; starting while one is
    /// already active replaces it (non-reentrant).
    ///
    /// # Errors
    ///
    /// [`ScanError::LimitExceeded`] with the relevant concurrency resource.
    pub fn track_operation(&self, kind: OperationKind) -> Result<OperationGuard<'_>> {
        {
            let mut slots = lock(&self.slots);
            match kind {
                OperationKind::Upload => {
                    if slots.uploads >= self.limits.max_concurrent_uploads {
                        return Err(limit(LimitResource::ConcurrentUploads {
                            current: slots.uploads,
                            max: self.limits.max_concurrent_uploads,
                        }));
                    }
                    slots.uploads += 1;
                }
                OperationKind::Extraction => {
                    if slots.extractions >= self.limits.max_concurrent_extractions {
                        return Err(limit(LimitResource::ConcurrentExtractions {
                            current: slots.extractions,
                            max: self.limits.max_concurrent_extractions,
                        }));
                    }
                    slots.extractions += 1;
                }
            }
        }
        self.start_tracking();
        Ok(OperationGuard {
            limiter: self,
            kind,
            released: false,
        })
    }

    /// Starts (or restarts) the tracking interval.
    pub fn start_tracking(&self) {
        *lock(&self.started) = Some(Instant::now());
    }

    /// Stops the tracking interval.
    pub fn stop_tracking(&self) {
        *lock(&self.started) = None;
    }

    /// Elapsed time of the active tracking interval, if one is running.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        lock(&self.started).map(|started| started.elapsed())
    }

    /// Creates a cooperative deadline scoped to `seconds`.
    ///
    /// There is no preemptive interrupt: callers check the deadline at their
    /// own granularity via [`TimeLimit::check`], and [`TimeLimit::finish`]
    /// can only report a timeout after the work has already run.
    #[must_use]
    pub fn time_limit(&self, seconds: u64) -> TimeLimit {
        TimeLimit::new(Duration::from_secs(seconds))
    }

    /// Pre-flight check that the disk holding `path` has at least
    /// `required_mb` free, independent of tracked-usage state.
    ///
    /// Degrades to `true` when the disk cannot be resolved: a monitoring
    /// gap is logged, not escalated.
    #[must_use]
    pub fn has_capacity(&self, path: &Path, required_mb: u64) -> bool {
        usage::free_space_mb(path).map_or_else(
            || {
                tracing::debug!(path = %path.display(), "no disk matched, assuming capacity");
                true
            },
            |free_mb| free_mb >= required_mb as f64,
        )
    }

    fn release(&self, kind: OperationKind) {
        let mut slots = lock(&self.slots);
        match kind {
            OperationKind::Upload => slots.uploads = slots.uploads.saturating_sub(1),
            OperationKind::Extraction => {
                slots.extractions = slots.extractions.saturating_sub(1);
            }
        }
    }

    /// Slots currently held for the given kind.
    #[must_use]
    pub fn active_operations(&self, kind: OperationKind) -> usize {
        let slots = lock(&self.slots);
        match kind {
            OperationKind::Upload => slots.uploads,
            OperationKind::Extraction => slots.extractions,
        }
    }
}

/// Scoped admission slot for one tracked operation.
///
/// Dropping the guard always releases the slot and stops tracking; the
/// post-hoc limits check then runs once. Prefer [`complete`](Self::complete)
/// so a violation is raised instead of merely logged.
#[derive(Debug)]
pub struct OperationGuard<'a> {
    limiter: &'a ResourceLimiter,
    kind: OperationKind,
    released: bool,
}

impl OperationGuard<'_> {
    /// The kind of operation this guard admits.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Releases the slot, stops tracking, and runs the post-hoc limits
    /// check, raising any violation detected after the fact.
    ///
    /// # Errors
    ///
    /// [`ScanError::LimitExceeded`] when the finished work breached a
    /// ceiling.
    pub fn complete(mut self) -> Result<()> {
        self.release();
        self.limiter.check_limits()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.limiter.release(self.kind);
            self.limiter.stop_tracking();
        }
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.release();
        if let Err(err) = self.limiter.check_limits() {
            tracing::warn!(kind = %self.kind, error = %err, "limit breach detected on guard drop");
        }
    }
}

/// A cooperative wall-clock deadline.
///
/// Where a preemptive interrupt facility would abort mid-scan, this degrades
/// to explicit checkpoints: call [`check`](Self::check) at convenient
/// points, and [`finish`](Self::finish) for the post-hoc verdict.
#[derive(Debug)]
pub struct TimeLimit {
    started: Instant,
    max: Duration,
}

impl TimeLimit {
    /// Starts a deadline of the given duration.
    #[must_use]
    pub fn new(max: Duration) -> Self {
        Self {
            started: Instant::now(),
            max,
        }
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.started.elapsed() > self.max
    }

    /// Time left before the deadline, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.max.saturating_sub(self.started.elapsed())
    }

    /// Raises when the deadline has passed.
    ///
    /// # Errors
    ///
    /// [`ScanError::LimitExceeded`] with the elapsed and configured times.
    pub fn check(&self) -> Result<()> {
        let elapsed = self.started.elapsed();
        if elapsed > self.max {
            return Err(limit(LimitResource::ProcessingTime {
                elapsed_seconds: elapsed.as_secs_f64(),
                max_seconds: self.max.as_secs(),
            }));
        }
        Ok(())
    }

    /// Post-hoc check at the end of the guarded region.
    ///
    /// # Errors
    ///
    /// Same as [`check`](Self::check); a timeout here means the work already
    /// overran.
    pub fn finish(self) -> Result<()> {
        self.check()
    }
}

fn limit(resource: LimitResource) -> ScanError {
    ScanError::LimitExceeded { resource }
}

/// Mutex access tolerating a poisoned lock: the guarded state is a pair of
/// counters and an instant, both valid regardless of a panicked holder.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
