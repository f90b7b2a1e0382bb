//! Fakes shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use media_catalog::{
    ByteStream, Catalog, CatalogError, CatalogResolver, StreamSource, VariantDescriptor,
};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use media_fetch::config::Config;
use media_fetch::disk::{Capacity, CapacityProbe, DiskGuard};
use media_fetch::pipeline::{MuxRequest, Muxer, Pipeline};
use media_fetch::{Error, Result};

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Resolver returning a fixed catalog.
pub struct FakeResolver {
    catalog: Catalog,
    pub calls: AtomicUsize,
}

impl FakeResolver {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CatalogResolver for FakeResolver {
    async fn resolve(
        &self,
        _identifier: &str,
        _cancel: &CancellationToken,
    ) -> std::result::Result<Catalog, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.catalog.clone())
    }
}

/// How a fake variant behaves when opened.
#[derive(Clone)]
pub enum Payload {
    /// Yields the bytes then ends.
    Bytes(Vec<u8>),
    /// Yields the bytes then fails with a connection reset.
    FailAfter(Vec<u8>),
    /// Yields the bytes after a delay.
    Slow(Vec<u8>, Duration),
}

/// Stream source keyed by variant id.
#[derive(Default)]
pub struct FakeSource {
    payloads: HashMap<String, Payload>,
    pub opened: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, payload: Payload) -> Self {
        self.payloads.insert(id.to_string(), payload);
        self
    }
}

struct ResetReader;

impl AsyncRead for ResetReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }
}

#[async_trait]
impl StreamSource for FakeSource {
    async fn open(
        &self,
        variant: &VariantDescriptor,
        _cancel: &CancellationToken,
    ) -> std::result::Result<ByteStream, CatalogError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let payload = self
            .payloads
            .get(&variant.id)
            .cloned()
            .ok_or_else(|| CatalogError::MissingLocation {
                id: variant.id.clone(),
            })?;

        let stream: ByteStream = match payload {
            Payload::Bytes(data) => Box::pin(io::Cursor::new(data)),
            Payload::FailAfter(data) => Box::pin(io::Cursor::new(data).chain(ResetReader)),
            Payload::Slow(data, delay) => {
                let stream = futures::stream::once(async move {
                    tokio::time::sleep(delay).await;
                    Ok::<_, io::Error>(Bytes::from(data))
                });
                Box::pin(StreamReader::new(Box::pin(stream)))
            }
        };
        Ok(stream)
    }
}

/// Muxer writing `video ++ audio` to the output.
#[derive(Default)]
pub struct ConcatMuxer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Muxer for ConcatMuxer {
    async fn mux(&self, request: &MuxRequest<'_>, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::merge("deadline exceeded before merge started"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut merged = tokio::fs::read(request.video).await?;
        merged.extend(tokio::fs::read(request.audio).await?);
        tokio::fs::write(request.output, merged).await?;
        Ok(())
    }
}

/// Probe reporting a fixed capacity.
pub struct FixedProbe(pub Capacity);

impl CapacityProbe for FixedProbe {
    fn capacity_of(&self, _path: &Path) -> io::Result<Capacity> {
        Ok(self.0)
    }
}

pub fn plenty_of_space() -> Arc<FixedProbe> {
    Arc::new(FixedProbe(Capacity::new(100 * GIB, 50 * GIB)))
}

pub fn test_config(scratch_dir: &Path) -> Config {
    Config {
        temp_dir: scratch_dir.to_path_buf(),
        buffer_size: 64,
        min_disk_space_gb: 1,
        ..Config::default()
    }
}

/// Standard catalog: one 720p video, one 1440p video, two audio tracks.
pub fn sample_catalog() -> Catalog {
    Catalog::new(
        "Big Buck Bunny",
        vec![
            VariantDescriptor::video("1440p", 1440),
            VariantDescriptor::video("720p", 720),
            VariantDescriptor::audio("aud-low", 48_000),
            VariantDescriptor::audio("aud-high", 128_000),
        ],
    )
}

pub fn sample_source() -> FakeSource {
    FakeSource::new()
        .with("1440p", Payload::Bytes(b"VIDEO-1440".to_vec()))
        .with("720p", Payload::Bytes(b"VIDEO-720".to_vec()))
        .with("aud-low", Payload::Bytes(b"AUDIO-LOW".to_vec()))
        .with("aud-high", Payload::Bytes(b"AUDIO-HIGH".to_vec()))
}

pub fn build_pipeline(
    config: &Config,
    probe: Arc<dyn CapacityProbe>,
    resolver: Arc<dyn CatalogResolver>,
    source: Arc<dyn StreamSource>,
    muxer: Arc<dyn Muxer>,
) -> Pipeline {
    let guard = DiskGuard::new(&config.temp_dir, probe);
    Pipeline::new(config, guard, resolver, source, muxer)
}

/// Names of all entries left in `dir`.
pub fn leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}
