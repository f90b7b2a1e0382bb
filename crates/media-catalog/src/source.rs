use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::CatalogError;
use crate::variant::VariantDescriptor;

/// Readable bytes of one variant.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Opens the byte stream behind a variant.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Open `variant` for reading. Reading the returned stream to EOF yields
    /// the complete elementary stream.
    async fn open(
        &self,
        variant: &VariantDescriptor,
        cancel: &CancellationToken,
    ) -> Result<ByteStream, CatalogError>;
}
