//! Filesystem helpers shared across modules.
//!
//! These helpers provide consistent error context (operation + path) and
//! treat removal of an already-gone file as a no-op.

use std::io::ErrorKind;
use std::path::Path;

use crate::{Error, Result};

/// Convert an IO error into an application error with operation + path context.
pub fn io_error(op: &'static str, path: &Path, source: std::io::Error) -> Error {
    Error::io_path(op, path, source)
}

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| io_error("creating directory", path, e))
}

/// Verify that files can be created inside `dir` by creating and dropping a
/// throwaway temp file.
pub fn ensure_writable(dir: &Path) -> Result<()> {
    tempfile::Builder::new()
        .prefix(".write-probe")
        .tempfile_in(dir)
        .map(drop)
        .map_err(|e| io_error("writing to", dir, e))
}

/// Remove a file, returning whether it existed.
pub async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Synchronous variant of [`remove_if_exists`] for use from `Drop`.
pub fn remove_if_exists_sync(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
