use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::CatalogError;
use crate::variant::VariantDescriptor;

/// All variants available for one media identifier.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Catalog {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub variants: Vec<VariantDescriptor>,
}

impl Catalog {
    pub fn new(title: impl Into<String>, variants: Vec<VariantDescriptor>) -> Self {
        Self {
            title: title.into(),
            variants,
        }
    }
}

/// Resolves a media identifier into its catalog of variants.
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    /// Resolve `identifier`, giving up when `cancel` fires.
    async fn resolve(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<Catalog, CatalogError>;
}
