//! Application-wide error types.

use std::fmt;
use std::path::{Path, PathBuf};

use media_catalog::CatalogError;
use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Which half of a run a fetch failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSide {
    Video,
    Audio,
}

impl StreamSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for StreamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn gib(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No eligible format: {0}")]
    NoEligibleFormat(String),

    #[error(
        "Insufficient disk space: need {:.1}GB, have {:.1}GB",
        gib(.required),
        gib(.available)
    )]
    InsufficientSpace { required: u64, available: u64 },

    #[error("{side} download failed: {reason}")]
    Fetch { side: StreamSide, reason: String },

    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("Server too busy, try again later")]
    AdmissionTimeout,

    #[error("Failed to remove {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error while {op} {}: {source}", .path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn no_eligible_format(msg: impl Into<String>) -> Self {
        Self::NoEligibleFormat(msg.into())
    }

    pub fn fetch(side: StreamSide, reason: impl Into<String>) -> Self {
        Self::Fetch {
            side,
            reason: reason.into(),
        }
    }

    pub fn merge(msg: impl Into<String>) -> Self {
        Self::Merge(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Short machine-readable label, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::NoEligibleFormat(_) => "no_eligible_format",
            Self::InsufficientSpace { .. } => "insufficient_space",
            Self::Fetch { .. } => "fetch_error",
            Self::Merge(_) => "merge_error",
            Self::AdmissionTimeout => "admission_timeout",
            Self::Cleanup { .. } => "cleanup_error",
            Self::Catalog(_) => "catalog_error",
            Self::Configuration(_) => "configuration_error",
            Self::IoPath { .. } | Self::Io(_) => "io_error",
            Self::Other(_) => "other",
        }
    }
}
