//! Catalog resolution and stream sources for media-fetch.
//!
//! A media identifier resolves to a [`Catalog`]: a title plus the list of
//! encoded [`VariantDescriptor`]s available for it. A [`StreamSource`] then
//! opens one variant as a plain byte stream. Both capabilities are traits so
//! the download pipeline can be driven by fakes in tests; [`http`] holds the
//! shipped implementation backed by `reqwest`.

pub mod error;
pub mod http;
pub mod resolver;
pub mod source;
pub mod variant;

pub use error::CatalogError;
pub use http::{HttpStreamSource, ManifestResolver};
pub use resolver::{Catalog, CatalogResolver};
pub use source::{ByteStream, StreamSource};
pub use variant::{VariantDescriptor, VariantKind};
