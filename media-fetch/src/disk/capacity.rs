//! Filesystem capacity probing.

use std::io;
use std::path::{Path, PathBuf};

use sysinfo::Disks;

/// Capacity of the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capacity {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl Capacity {
    pub fn new(total_bytes: u64, available_bytes: u64) -> Self {
        Self {
            total_bytes,
            available_bytes,
        }
    }

    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    /// Get the percentage of space used.
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.used_bytes() as f64 / self.total_bytes as f64) * 100.0
        }
    }
}

/// Answers "how much space is there where this path lives".
pub trait CapacityProbe: Send + Sync {
    fn capacity_of(&self, path: &Path) -> io::Result<Capacity>;
}

/// Probe backed by the mounted-disk list reported by `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCapacityProbe;

impl CapacityProbe for SystemCapacityProbe {
    fn capacity_of(&self, path: &Path) -> io::Result<Capacity> {
        let path = normalize(&path.canonicalize()?);
        let disks = Disks::new_with_refreshed_list();

        longest_mount_match(
            &path,
            disks.list().iter().map(|d| {
                (
                    d.mount_point(),
                    Capacity::new(d.total_space(), d.available_space()),
                )
            }),
        )
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mounted filesystem contains {}", path.display()),
            )
        })
    }
}

/// Pick the capacity of the most specific mount point containing `path`.
fn longest_mount_match<'a>(
    path: &Path,
    mounts: impl IntoIterator<Item = (&'a Path, Capacity)>,
) -> Option<Capacity> {
    let mut best_match: Option<(usize, Capacity)> = None;

    for (mount_point, capacity) in mounts {
        if !path.starts_with(mount_point) {
            continue;
        }
        let depth = mount_point.components().count();
        if best_match.is_none_or(|(len, _)| depth > len) {
            best_match = Some((depth, capacity));
        }
    }

    best_match.map(|(_, capacity)| capacity)
}

#[cfg(windows)]
fn normalize(path: &Path) -> PathBuf {
    // canonicalize yields verbatim paths; mount points are plain `C:\`
    match path.to_str().and_then(|s| s.strip_prefix(r"\\?\")) {
        Some(stripped) => PathBuf::from(stripped),
        None => path.to_path_buf(),
    }
}

#[cfg(not(windows))]
fn normalize(path: &Path) -> PathBuf {
    path.to_path_buf()
}
