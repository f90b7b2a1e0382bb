//! Per-run bookkeeping: identifiers, scratch paths and artifact cleanup.

use chrono::{DateTime, Utc};
use media_catalog::VariantDescriptor;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::Error;
use crate::utils::fs;

/// Unique identifier of one pipeline run, embedded in every scratch filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// What a scratch file is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactRole {
    Video,
    Audio,
    Output,
}

impl ArtifactRole {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Video => "_video.tmp",
            Self::Audio => "_audio.tmp",
            Self::Output => "_final.mp4",
        }
    }
}

/// The three scratch paths owned by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
}

impl RunPaths {
    pub fn for_run(scratch_dir: &Path, id: RunId) -> Self {
        let path = |role: ArtifactRole| scratch_dir.join(format!("{}{}", id, role.suffix()));
        Self {
            video: path(ArtifactRole::Video),
            audio: path(ArtifactRole::Audio),
            output: path(ArtifactRole::Output),
        }
    }
}

/// Scratch files a run has created (or may have partially created).
///
/// Every recorded path is removed exactly once: by [`RunArtifacts::cleanup`],
/// or on drop if cleanup never ran.
#[derive(Debug)]
pub struct RunArtifacts {
    run_id: RunId,
    paths: Vec<PathBuf>,
}

impl RunArtifacts {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            paths: Vec::new(),
        }
    }

    /// Record `path` before anything may be written to it.
    pub fn record(&mut self, path: &Path) {
        if !self.paths.iter().any(|p| p == path) {
            self.paths.push(path.to_path_buf());
        }
    }

    /// Hand the recorded paths over to a new owner, leaving this one empty.
    pub fn take(&mut self) -> Self {
        Self {
            run_id: self.run_id,
            paths: std::mem::take(&mut self.paths),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Remove every recorded path, returning how many files were removed.
    /// Failures are logged, never raised.
    pub async fn cleanup(&mut self) -> usize {
        let mut removed = 0;
        for path in std::mem::take(&mut self.paths) {
            match fs::remove_if_exists(&path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(source) => {
                    let err = Error::Cleanup { path, source };
                    warn!(run_id = %self.run_id, error = %err, "Cleanup failed");
                }
            }
        }
        debug!(run_id = %self.run_id, removed, "Run artifacts cleaned up");
        removed
    }
}

impl Drop for RunArtifacts {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            if let Err(source) = fs::remove_if_exists_sync(&path) {
                let err = Error::Cleanup { path, source };
                warn!(run_id = %self.run_id, error = %err, "Cleanup on drop failed");
            }
        }
    }
}

/// Lifecycle of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Selecting,
    Fetching,
    Merging,
    Ready,
    Failed,
    Cleanup,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selecting => "selecting",
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request record of one pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    pub id: RunId,
    pub state: PipelineState,
    pub paths: RunPaths,
    pub video: Option<VariantDescriptor>,
    pub audio: Option<VariantDescriptor>,
    pub started_at: DateTime<Utc>,
    pub artifacts: RunArtifacts,
}

impl PipelineRun {
    pub fn new(scratch_dir: &Path) -> Self {
        let id = RunId::new();
        Self {
            id,
            state: PipelineState::Selecting,
            paths: RunPaths::for_run(scratch_dir, id),
            video: None,
            audio: None,
            started_at: Utc::now(),
            artifacts: RunArtifacts::new(id),
        }
    }

    pub fn transition(&mut self, next: PipelineState) {
        debug!(run_id = %self.id, from = %self.state, to = %next, "Pipeline state change");
        self.state = next;
    }
}

/// A merged file ready to be served. Owns the run's remaining artifacts, so
/// dropping it without serving still cleans up.
#[derive(Debug)]
pub struct ReadyArtifact {
    pub run_id: RunId,
    pub output_path: PathBuf,
    pub download_name: String,
    pub size_bytes: u64,
    pub started_at: DateTime<Utc>,
    pub artifacts: RunArtifacts,
}
