//! Disk guard for the scratch directory.
//!
//! Gates service health and individual downloads on the free space of the
//! filesystem holding the scratch directory.

pub mod capacity;

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub use capacity::{Capacity, CapacityProbe, SystemCapacityProbe};

use crate::{Error, Result};

const MIB: f64 = 1024.0 * 1024.0;

/// Multiplier applied to declared content lengths: video, audio and the
/// merged output coexist on disk before cleanup.
pub const REQUIREMENT_FACTOR: u64 = 3;

/// Space needed to fetch and merge two streams of the given declared sizes.
pub fn estimated_requirement(video_bytes: u64, audio_bytes: u64) -> u64 {
    video_bytes
        .saturating_add(audio_bytes)
        .saturating_mul(REQUIREMENT_FACTOR)
}

/// Point-in-time view of scratch filesystem usage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct UsageSnapshot {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub usage_percent: f64,
}

impl UsageSnapshot {
    pub fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / MIB
    }

    pub fn used_mb(&self) -> f64 {
        self.used_bytes as f64 / MIB
    }

    pub fn available_mb(&self) -> f64 {
        self.available_bytes as f64 / MIB
    }

    /// Whether the probe returned anything meaningful.
    pub fn is_available(&self) -> bool {
        self.total_bytes > 0
    }
}

impl From<Capacity> for UsageSnapshot {
    fn from(cap: Capacity) -> Self {
        Self {
            total_bytes: cap.total_bytes,
            used_bytes: cap.used_bytes(),
            available_bytes: cap.available_bytes,
            usage_percent: cap.used_percent(),
        }
    }
}

/// Capacity checks against the scratch directory.
#[derive(Clone)]
pub struct DiskGuard {
    scratch_dir: PathBuf,
    probe: Arc<dyn CapacityProbe>,
}

impl std::fmt::Debug for DiskGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskGuard")
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

impl DiskGuard {
    pub fn new(scratch_dir: impl Into<PathBuf>, probe: Arc<dyn CapacityProbe>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            probe,
        }
    }

    /// Guard backed by the host's mounted filesystems.
    pub fn system(scratch_dir: impl Into<PathBuf>) -> Self {
        Self::new(scratch_dir, Arc::new(SystemCapacityProbe))
    }

    /// Fail with [`Error::InsufficientSpace`] unless at least `required_bytes`
    /// are available. Returns the available byte count on success.
    pub fn check_capacity(&self, required_bytes: u64) -> Result<u64> {
        let capacity = self
            .probe
            .capacity_of(&self.scratch_dir)
            .map_err(|e| Error::io_path("querying capacity of", &self.scratch_dir, e))?;

        if capacity.available_bytes < required_bytes {
            return Err(Error::InsufficientSpace {
                required: required_bytes,
                available: capacity.available_bytes,
            });
        }
        Ok(capacity.available_bytes)
    }

    /// Current usage; all zeros when the probe fails.
    pub fn usage(&self) -> UsageSnapshot {
        match self.probe.capacity_of(&self.scratch_dir) {
            Ok(capacity) => capacity.into(),
            Err(e) => {
                warn!(path = %self.scratch_dir.display(), error = %e, "Failed to query scratch usage");
                UsageSnapshot::default()
            }
        }
    }

    pub fn log_usage(&self, label: &str) {
        let usage = self.usage();
        if !usage.is_available() {
            return;
        }
        info!(
            "{}: scratch usage {:.1}MB/{:.1}MB ({:.1}%), available {:.1}MB",
            label,
            usage.used_mb(),
            usage.total_mb(),
            usage.usage_percent,
            usage.available_mb()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::Path;

    struct FixedProbe(Capacity);

    impl CapacityProbe for FixedProbe {
        fn capacity_of(&self, _path: &Path) -> io::Result<Capacity> {
            Ok(self.0)
        }
    }

    struct FailingProbe;

    impl CapacityProbe for FailingProbe {
        fn capacity_of(&self, _path: &Path) -> io::Result<Capacity> {
            Err(io::Error::other("stat failed"))
        }
    }

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_check_capacity() {
        let guard = DiskGuard::new("/scratch", Arc::new(FixedProbe(Capacity::new(10 * GIB, GIB))));

        assert_eq!(guard.check_capacity(GIB).unwrap(), GIB);
        match guard.check_capacity(2 * GIB) {
            Err(Error::InsufficientSpace {
                required,
                available,
            }) => {
                assert_eq!(required, 2 * GIB);
                assert_eq!(available, GIB);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_probe_failure() {
        let guard = DiskGuard::new("/scratch", Arc::new(FailingProbe));
        assert!(matches!(guard.check_capacity(0), Err(Error::IoPath { .. })));
        assert_eq!(guard.usage(), UsageSnapshot::default());
        assert!(!guard.usage().is_available());
    }

    #[test]
    fn test_usage_snapshot() {
        let guard = DiskGuard::new(
            "/scratch",
            Arc::new(FixedProbe(Capacity::new(400 * 1024 * 1024, 100 * 1024 * 1024))),
        );
        let usage = guard.usage();
        assert!(usage.is_available());
        assert_eq!(usage.total_mb(), 400.0);
        assert_eq!(usage.used_mb(), 300.0);
        assert_eq!(usage.available_mb(), 100.0);
        assert!((usage.usage_percent - 75.0).abs() < 0.001);
    }

    #[test]
    fn test_estimated_requirement() {
        assert_eq!(estimated_requirement(100, 20), 360);
        assert_eq!(estimated_requirement(0, 0), 0);
        assert_eq!(estimated_requirement(u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn test_system_probe_on_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let guard = DiskGuard::system(dir.path());
        // containers may hide mounts; only assert consistency when a match exists
        if let Ok(available) = guard.check_capacity(0) {
            let usage = guard.usage();
            assert!(usage.total_bytes >= usage.available_bytes);
            assert!(available <= usage.total_bytes || usage.total_bytes == 0);
        }
    }
}
