// HTTP-backed catalog: the identifier is a manifest URL, variants point at plain HTTP resources.

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::resolver::{Catalog, CatalogResolver};
use crate::source::{ByteStream, StreamSource};
use crate::variant::VariantDescriptor;
use crate::CatalogError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Build the shared client used by both the resolver and the stream source.
///
/// Compression is disabled: media payloads are already compressed and the
/// declared content lengths must match the bytes on the wire.
pub fn default_client() -> Result<Client, CatalogError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .no_gzip()
        .no_deflate()
        .build()
        .map_err(CatalogError::from)
}

fn parse_http_url(input: &str) -> Result<Url, CatalogError> {
    let url = Url::parse(input).map_err(|e| CatalogError::invalid_identifier(input, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(CatalogError::invalid_identifier(
            input,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

async fn send(
    client: &Client,
    url: Url,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, CatalogError> {
    let request = client.get(url.clone()).send();
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(CatalogError::Cancelled),
        response = request => response?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(CatalogError::HttpStatus {
            status,
            url: url.to_string(),
        });
    }
    Ok(response)
}

/// Resolves an identifier by downloading a JSON manifest from it.
///
/// The manifest has the shape of [`Catalog`]:
/// `{"title": "...", "variants": [{"id": "137", "kind": "video", "height": 1080, ...}]}`.
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    client: Client,
}

impl ManifestResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogResolver for ManifestResolver {
    #[instrument(skip(self, cancel))]
    async fn resolve(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<Catalog, CatalogError> {
        let url = parse_http_url(identifier)?;
        let response = send(&self.client, url, cancel).await?;

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CatalogError::Cancelled),
            body = response.bytes() => body?,
        };

        let catalog: Catalog =
            serde_json::from_slice(&body).map_err(|e| CatalogError::malformed(e.to_string()))?;
        debug!(
            title = %catalog.title,
            variants = catalog.variants.len(),
            "Resolved catalog"
        );
        Ok(catalog)
    }
}

/// Streams a variant's bytes from its `url`.
#[derive(Debug, Clone)]
pub struct HttpStreamSource {
    client: Client,
}

impl HttpStreamSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamSource for HttpStreamSource {
    async fn open(
        &self,
        variant: &VariantDescriptor,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, CatalogError> {
        let location = variant
            .url
            .as_deref()
            .ok_or_else(|| CatalogError::MissingLocation {
                id: variant.id.clone(),
            })?;
        let url = parse_http_url(location)?;
        let response = send(&self.client, url, cancel).await?;

        debug!(
            variant = %variant,
            content_length = ?response.content_length(),
            "Opened variant stream"
        );

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_url_rejects_other_schemes() {
        assert!(parse_http_url("https://example.com/manifest.json").is_ok());
        assert!(matches!(
            parse_http_url("ftp://example.com/file"),
            Err(CatalogError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            parse_http_url("not a url"),
            Err(CatalogError::InvalidIdentifier { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_invalid_identifier_fails_before_network() {
        let resolver = ManifestResolver::new(Client::new());
        let err = resolver
            .resolve("dQw4w9WgXcQ", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidIdentifier { .. }));
    }

    #[tokio::test]
    async fn test_open_without_location() {
        let source = HttpStreamSource::new(Client::new());
        let variant = VariantDescriptor::audio("140", 128_000);
        let err = source
            .open(&variant, &CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CatalogError::MissingLocation { id } if id == "140"));
    }

    #[test]
    fn test_catalog_manifest_shape() {
        let json = r#"{
            "title": "Big Buck Bunny",
            "variants": [
                {"id": "137", "kind": "video", "height": 1080, "content_length": 1000, "url": "https://cdn.example/137"},
                {"id": "140", "kind": "audio", "bitrate": 128000, "url": "https://cdn.example/140"}
            ]
        }"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.title, "Big Buck Bunny");
        assert_eq!(catalog.variants.len(), 2);
        assert!(catalog.variants[0].is_video());
        assert!(catalog.variants[1].is_audio());
    }
}
