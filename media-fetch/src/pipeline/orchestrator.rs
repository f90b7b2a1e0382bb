//! Pipeline orchestrator.
//!
//! Drives one download through `Selecting -> Fetching -> Merging -> Ready`.
//! Any failure moves the run to `Failed` and its scratch files are removed
//! before the error is returned. On success the files travel with the
//! [`ReadyArtifact`] and are removed once it has been served (or dropped).

use std::path::Path;
use std::sync::Arc;

use media_catalog::{CatalogError, CatalogResolver, StreamSource, VariantDescriptor};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

use super::deadline::Deadline;
use super::muxer::{MuxRequest, Muxer, Preset};
use super::run::{PipelineRun, PipelineState, ReadyArtifact};
use crate::disk::{DiskGuard, estimated_requirement};
use crate::downloader::{FormatSelector, StreamFetcher};
use crate::error::StreamSide;
use crate::utils::filename::download_name;
use crate::{Error, Result};

/// Coordinates selection, the two parallel fetches and the merge.
pub struct Pipeline {
    scratch_dir: std::path::PathBuf,
    preset: Preset,
    selector: FormatSelector,
    fetcher: StreamFetcher,
    disk_guard: DiskGuard,
    resolver: Arc<dyn CatalogResolver>,
    source: Arc<dyn StreamSource>,
    muxer: Arc<dyn Muxer>,
}

impl Pipeline {
    pub fn new(
        config: &crate::config::Config,
        disk_guard: DiskGuard,
        resolver: Arc<dyn CatalogResolver>,
        source: Arc<dyn StreamSource>,
        muxer: Arc<dyn Muxer>,
    ) -> Self {
        Self {
            scratch_dir: config.temp_dir.clone(),
            preset: config.ffmpeg_preset,
            selector: FormatSelector::new(config.max_video_height),
            fetcher: StreamFetcher::new(config.buffer_size),
            disk_guard,
            resolver,
            source,
            muxer,
        }
    }

    /// Run the pipeline for `identifier` under `deadline`.
    pub async fn run(&self, identifier: &str, deadline: &Deadline) -> Result<ReadyArtifact> {
        let mut run = PipelineRun::new(&self.scratch_dir);
        let span = info_span!("pipeline", run_id = %run.id);

        async {
            match self.execute(&mut run, identifier, deadline.token()).await {
                Ok(ready) => {
                    run.transition(PipelineState::Ready);
                    Ok(ready)
                }
                Err(e) => {
                    let from = run.state;
                    run.transition(PipelineState::Failed);
                    error!(
                        stage = %from,
                        kind = e.kind(),
                        deadline_expired = deadline.is_expired(),
                        timeout_secs = deadline.timeout().as_secs(),
                        error = %e,
                        "Pipeline failed"
                    );

                    run.transition(PipelineState::Cleanup);
                    run.artifacts.cleanup().await;
                    self.disk_guard.log_usage("After cleanup");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        run: &mut PipelineRun,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<ReadyArtifact> {
        let catalog = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CatalogError::Cancelled.into()),
            catalog = self.resolver.resolve(identifier, cancel) => catalog.map_err(|e| match e {
                CatalogError::InvalidIdentifier { .. } => Error::invalid_request(e.to_string()),
                other => other.into(),
            })?,
        };

        let (video, audio) = self.selector.select_pair(&catalog.variants)?;
        info!(
            title = %catalog.title,
            video = %video,
            audio = %audio,
            "Selected formats"
        );
        run.video = Some(video.clone());
        run.audio = Some(audio.clone());

        run.transition(PipelineState::Fetching);
        let estimate = estimated_requirement(
            video.content_length.unwrap_or_default(),
            audio.content_length.unwrap_or_default(),
        );
        if estimate > 0 {
            self.disk_guard.check_capacity(estimate)?;
        }

        run.artifacts.record(&run.paths.video);
        run.artifacts.record(&run.paths.audio);
        let (video_result, audio_result) = tokio::join!(
            self.fetch_side(StreamSide::Video, &video, &run.paths.video, cancel),
            self.fetch_side(StreamSide::Audio, &audio, &run.paths.audio, cancel),
        );
        let video_bytes = video_result?;
        let audio_bytes = audio_result?;
        info!(video_bytes, audio_bytes, "Both streams fetched");
        self.disk_guard.log_usage("After fetch");

        if cancel.is_cancelled() {
            return Err(Error::merge("deadline exceeded before merge started"));
        }

        run.transition(PipelineState::Merging);
        run.artifacts.record(&run.paths.output);
        let request = MuxRequest {
            video: &run.paths.video,
            audio: &run.paths.audio,
            output: &run.paths.output,
            preset: self.preset,
        };
        self.muxer.mux(&request, cancel).await?;

        let size_bytes = output_size(&run.paths.output).await?;
        let elapsed = chrono::Utc::now() - run.started_at;
        info!(
            size_bytes,
            elapsed_ms = elapsed.num_milliseconds(),
            "Merged file ready"
        );

        Ok(ReadyArtifact {
            run_id: run.id,
            output_path: run.paths.output.clone(),
            download_name: download_name(&catalog.title),
            size_bytes,
            started_at: run.started_at,
            artifacts: run.artifacts.take(),
        })
    }

    async fn fetch_side(
        &self,
        side: StreamSide,
        variant: &VariantDescriptor,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let reader = self
            .source
            .open(variant, cancel)
            .await
            .map_err(|e| Error::fetch(side, e.to_string()))?;
        self.fetcher.fetch(side, reader, dest, cancel).await
    }
}

async fn output_size(path: &Path) -> Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(Error::merge("muxer produced an empty file")),
        Err(e) => Err(Error::merge(format!(
            "muxer produced no output at {}: {}",
            path.display(),
            e
        ))),
    }
}
