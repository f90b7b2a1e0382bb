//! Stream fetcher: copies one variant's bytes to a run-scoped scratch file.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::StreamSide;
use crate::{Error, Result};

/// Pulls a byte stream into a file in fixed-size chunks.
#[derive(Debug, Clone, Copy)]
pub struct StreamFetcher {
    buffer_size: usize,
}

impl StreamFetcher {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// Copy `reader` into a newly created `dest` until end of stream.
    ///
    /// `dest` must not exist. Cancellation is checked before every read; a
    /// cancelled or failed fetch leaves whatever was written so far on disk
    /// for the caller to clean up.
    pub async fn fetch<R>(
        &self,
        side: StreamSide,
        reader: R,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = reader;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(dest).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                error!(path = %dest.display(), side = %side, "Scratch path collision");
                return Err(Error::fetch(
                    side,
                    format!("scratch path {} already exists", dest.display()),
                ));
            }
            Err(e) => {
                return Err(Error::fetch(
                    side,
                    format!("failed to create {}: {}", dest.display(), e),
                ));
            }
        };

        let mut buffer = vec![0u8; self.buffer_size];
        let mut written = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::fetch(side, "cancelled"));
            }

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::fetch(side, "cancelled")),
                read = reader.read(&mut buffer) => {
                    read.map_err(|e| Error::fetch(side, format!("read failed after {written} bytes: {e}")))?
                }
            };
            if read == 0 {
                break;
            }

            file.write_all(&buffer[..read])
                .await
                .map_err(|e| Error::fetch(side, format!("write to {} failed: {}", dest.display(), e)))?;
            written += read as u64;
        }

        file.flush()
            .await
            .map_err(|e| Error::fetch(side, format!("flush of {} failed: {}", dest.display(), e)))?;

        debug!(side = %side, path = %dest.display(), bytes = written, "Fetch complete");
        Ok(written)
    }
}
