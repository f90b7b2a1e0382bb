//! Scratch janitor.
//!
//! Periodically deletes scratch files older than the configured max age.
//! This is a backstop for runs that never reached their own cleanup (process
//! killed mid-run, panics); it runs alongside active pipelines and only ever
//! touches files that are already stale.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::disk::DiskGuard;
use crate::utils::fs;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub files_removed: usize,
    pub bytes_reclaimed: u64,
}

pub struct ScratchJanitor {
    scratch_dir: PathBuf,
    max_age: Duration,
    disk_guard: DiskGuard,
}

impl ScratchJanitor {
    pub fn new(scratch_dir: impl Into<PathBuf>, max_age: Duration, disk_guard: DiskGuard) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            max_age,
            disk_guard,
        }
    }

    /// Delete every regular file in the scratch directory older than the
    /// max age. Directories and unreadable entries are skipped.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut entries = tokio::fs::read_dir(&self.scratch_dir)
            .await
            .map_err(|e| fs::io_error("reading", &self.scratch_dir, e))?;

        let now = SystemTime::now();
        let mut report = SweepReport::default();

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.scratch_dir.display(), error = %e, "Stopped scanning scratch directory");
                    break;
                }
            };
            let path = entry.path();

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= self.max_age {
                continue;
            }

            match fs::remove_if_exists(&path).await {
                Ok(true) => {
                    report.files_removed += 1;
                    report.bytes_reclaimed += metadata.len();
                    debug!(path = %path.display(), age_secs = age.as_secs(), "Removed stale scratch file");
                }
                // a pipeline cleaned it up first
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove stale scratch file");
                }
            }
        }

        Ok(report)
    }

    /// Run a sweep now and then every `period` until `cancel` fires.
    pub fn start(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            // first tick completes immediately
            let mut ticker = interval(period);

            info!(
                "Scratch janitor started (interval: {}s, max age: {}s)",
                period.as_secs(),
                self.max_age.as_secs()
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Scratch janitor shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.disk_guard.log_usage("Before sweep");
                        match self.sweep().await {
                            Ok(report) => {
                                if report.files_removed > 0 {
                                    info!(
                                        "Sweep removed {} stale files ({:.2}MB reclaimed)",
                                        report.files_removed,
                                        report.bytes_reclaimed as f64 / (1024.0 * 1024.0)
                                    );
                                }
                            }
                            Err(e) => error!("Sweep failed: {}", e),
                        }
                        self.disk_guard.log_usage("After sweep");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{Capacity, CapacityProbe};
    use std::path::Path;

    struct NoProbe;

    impl CapacityProbe for NoProbe {
        fn capacity_of(&self, _path: &Path) -> std::io::Result<Capacity> {
            Ok(Capacity::default())
        }
    }

    fn janitor(dir: &Path) -> ScratchJanitor {
        ScratchJanitor::new(
            dir,
            Duration::from_secs(30 * 60),
            DiskGuard::new(dir, Arc::new(NoProbe)),
        )
    }

    fn write_aged(path: &Path, contents: &[u8], age: Duration) {
        std::fs::write(path, contents).unwrap();
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("old_video.tmp");
        let fresh = dir.path().join("new_video.tmp");
        let subdir = dir.path().join("nested");

        write_aged(&stale, &[0u8; 2048], Duration::from_secs(2 * 3600));
        write_aged(&fresh, b"fresh", Duration::from_secs(60));
        std::fs::create_dir(&subdir).unwrap();

        let report = janitor(dir.path()).sweep().await.unwrap();

        assert_eq!(report.files_removed, 1);
        assert_eq!(report.bytes_reclaimed, 2048);
        assert!(!stale.exists());
        assert!(fresh.exists());
        assert!(subdir.exists());
    }

    #[tokio::test]
    async fn test_second_sweep_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            write_aged(
                &dir.path().join(format!("{i}_audio.tmp")),
                b"data",
                Duration::from_secs(3600),
            );
        }

        let janitor = janitor(dir.path());
        assert_eq!(janitor.sweep().await.unwrap().files_removed, 3);
        assert_eq!(janitor.sweep().await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        assert!(janitor(&missing).sweep().await.is_err());
    }

    #[tokio::test]
    async fn test_background_task_runs_immediately_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("leaked_final.mp4");
        write_aged(&stale, b"leak", Duration::from_secs(3600));

        let cancel = CancellationToken::new();
        let handle = Arc::new(janitor(dir.path())).start(Duration::from_secs(3600), cancel.clone());

        for _ in 0..100 {
            if !stale.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!stale.exists());

        cancel.cancel();
        handle.await.unwrap();
    }
}
