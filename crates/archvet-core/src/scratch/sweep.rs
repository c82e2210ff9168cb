//! Background scratch sweeper.
//!
//! An explicit worker thread that periodically invokes
//! [`SecureTempFileManager::cleanup_old_files`] until stopped. No scheduler
//! framework is involved; shutdown is a channel send plus a join.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use super::SecureTempFileManager;

/// Handle to a running background sweep.
///
/// Dropping the handle stops the sweeper and joins its thread.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SweepHandle {
    /// Stops the sweeper and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        // Send fails only when the thread already exited; either way join.
        let _ = self.shutdown.send(());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("scratch sweeper thread panicked");
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

impl SecureTempFileManager {
    /// Spawns the background sweep loop at the configured interval.
    ///
    /// The manager must be shared through an `Arc` so the worker can outlive
    /// the spawning scope; the returned handle stops it.
    #[must_use]
    pub fn start_sweeper(self: &Arc<Self>) -> SweepHandle {
        let manager = Arc::clone(self);
        let interval = manager.config().sweep_interval;
        let (shutdown, ticker) = mpsc::channel::<()>();

        let thread = thread::spawn(move || {
            loop {
                match ticker.recv_timeout(interval) {
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        let removed = manager.cleanup_old_files(None);
                        if removed > 0 {
                            tracing::info!(removed, "scratch sweep reclaimed entries");
                        }
                    }
                    // Explicit stop or the handle went away entirely.
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        SweepHandle {
            shutdown,
            thread: Some(thread),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::scratch::ScratchConfig;
    use std::time::Duration;

    fn shared_manager(base: &std::path::Path, sweep_interval: Duration) -> Arc<SecureTempFileManager> {
        let config = ScratchConfig {
            base_dir: base.to_path_buf(),
            sweep_interval,
            max_age: Duration::ZERO,
            cleanup_on_drop: false,
            ..Default::default()
        };
        Arc::new(SecureTempFileManager::new(config).expect("failed to create manager"))
    }

    #[test]
    fn test_sweeper_reclaims_stale_entries() {
        let root = tempfile::TempDir::new().unwrap();
        let manager = shared_manager(&root.path().join("scratch"), Duration::from_millis(25));

        let stale = manager.create_temp_directory(Some("stale"), None).unwrap();
        let handle = manager.start_sweeper();

        // Give the sweeper a few ticks; max_age is zero so the entry goes.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while stale.exists() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        handle.stop();
        assert!(!stale.exists());
        assert_eq!(manager.tracked_count(), 0);
    }

    #[test]
    fn test_stop_joins_cleanly() {
        let root = tempfile::TempDir::new().unwrap();
        let manager = shared_manager(&root.path().join("scratch"), Duration::from_secs(3600));
        let handle = manager.start_sweeper();
        // Stopping a long-interval sweeper returns promptly.
        handle.stop();
    }

    #[test]
    fn test_drop_stops_sweeper() {
        let root = tempfile::TempDir::new().unwrap();
        let manager = shared_manager(&root.path().join("scratch"), Duration::from_secs(3600));
        let handle = manager.start_sweeper();
        drop(handle);
        // The manager is still usable after the sweeper is gone.
        let dir = manager.create_temp_directory(None, None).unwrap();
        assert!(dir.exists());
    }
}
