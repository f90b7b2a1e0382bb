//! Download pipeline: admission, per-run bookkeeping, orchestration,
//! merging and scratch cleanup.

pub mod admission;
pub mod deadline;
pub mod janitor;
pub mod muxer;
pub mod orchestrator;
pub mod run;

pub use admission::{AdmissionController, AdmissionPermit};
pub use deadline::Deadline;
pub use janitor::{ScratchJanitor, SweepReport};
pub use muxer::{FfmpegMuxer, MuxRequest, Muxer, Preset};
pub use orchestrator::Pipeline;
pub use run::{PipelineRun, PipelineState, ReadyArtifact, RunArtifacts, RunId, RunPaths};
