//! Artifact streamer: serves a merged file, then runs the run's cleanup.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use futures::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{Instrument, Span, info, info_span, warn};

use crate::disk::DiskGuard;
use crate::metrics::MetricsCollector;
use crate::pipeline::{AdmissionPermit, ReadyArtifact};
use crate::utils::fs;
use crate::{Error, Result};

const MEDIA_TYPE: &str = "video/mp4";

/// Streams finished artifacts to clients.
#[derive(Clone)]
pub struct ArtifactStreamer {
    buffer_size: usize,
    metrics: Arc<MetricsCollector>,
    disk_guard: DiskGuard,
}

impl ArtifactStreamer {
    pub fn new(buffer_size: usize, metrics: Arc<MetricsCollector>, disk_guard: DiskGuard) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            metrics,
            disk_guard,
        }
    }

    /// Build the download response for `ready`.
    ///
    /// The body reads the file in `buffer_size` chunks and holds `permit`
    /// until the transfer ends. The run is settled once the last byte has
    /// been handed to the transport or the body is dropped early: metrics are
    /// recorded and every scratch file of the run is removed either way.
    pub async fn serve(&self, mut ready: ReadyArtifact, permit: AdmissionPermit) -> Result<Response> {
        let file = match File::open(&ready.output_path).await {
            Ok(file) => file,
            Err(e) => {
                let err = fs::io_error("opening", &ready.output_path, e);
                ready.artifacts.cleanup().await;
                return Err(err);
            }
        };

        let size_bytes = ready.size_bytes;
        let disposition = content_disposition(&ready.download_name);
        let span = info_span!("serve", run_id = %ready.run_id);
        let body = ArtifactBody {
            inner: ReaderStream::with_capacity(file, self.buffer_size),
            sent: 0,
            pending: Some(PendingRun {
                ready,
                permit,
                streamer: self.clone(),
                span,
            }),
        };

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, MEDIA_TYPE)
            .header(header::CONTENT_LENGTH, size_bytes)
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(Body::from_stream(body))
            .map_err(|e| Error::Other(format!("Failed to build response: {}", e)))
    }
}

/// Run state carried by a response body until the transfer is settled.
struct PendingRun {
    ready: ReadyArtifact,
    permit: AdmissionPermit,
    streamer: ArtifactStreamer,
    span: Span,
}

impl PendingRun {
    fn finish(self, sent: u64, read_error: Option<io::Error>) {
        let Self {
            mut ready,
            permit,
            streamer,
            span,
        } = self;

        let failure = match read_error {
            Some(e) => Some(e),
            None if sent < ready.size_bytes => Some(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                format!("transfer stopped after {} of {} bytes", sent, ready.size_bytes),
            )),
            None => None,
        };

        span.in_scope(|| match failure {
            None => {
                streamer.metrics.record_success(sent);
                let elapsed = chrono::Utc::now() - ready.started_at;
                info!(
                    file = %ready.download_name,
                    bytes = sent,
                    elapsed_ms = elapsed.num_milliseconds(),
                    "Download served"
                );
            }
            Some(e) => {
                let err = fs::io_error("streaming", &ready.output_path, e);
                streamer.metrics.record_failure(err.kind());
                warn!(error = %err, "Streaming to client failed");
            }
        });

        let cleanup = async move {
            ready.artifacts.cleanup().await;
            streamer.disk_guard.log_usage("After cleanup");
            drop(permit);
        }
        .instrument(span);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(cleanup);
            }
            // dropping the unpolled future removes the files synchronously
            Err(_) => drop(cleanup),
        }
    }
}

/// Response body over the merged file.
struct ArtifactBody {
    inner: ReaderStream<File>,
    sent: u64,
    pending: Option<PendingRun>,
}

impl ArtifactBody {
    fn settle(&mut self, read_error: Option<io::Error>) {
        if let Some(pending) = self.pending.take() {
            pending.finish(self.sent, read_error);
        }
    }
}

impl Stream for ArtifactBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        match &polled {
            Poll::Ready(Some(Ok(chunk))) => this.sent += chunk.len() as u64,
            Poll::Ready(Some(Err(e))) => this.settle(Some(io::Error::new(e.kind(), e.to_string()))),
            Poll::Ready(None) => this.settle(None),
            Poll::Pending => {}
        }
        polled
    }
}

impl Drop for ArtifactBody {
    fn drop(&mut self) {
        // the transport drops the body once the declared length is written,
        // or early when the client goes away
        self.settle(None);
    }
}

/// `attachment` disposition with an ASCII fallback name and an RFC 5987
/// encoded UTF-8 name.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();

    if fallback == name {
        return format!("attachment; filename=\"{}\"", name);
    }

    let mut encoded = String::with_capacity(name.len() * 3);
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}
