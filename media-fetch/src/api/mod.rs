//! HTTP surface.

pub mod artifact;
pub mod error;
pub mod routes;
pub mod server;

pub use artifact::ArtifactStreamer;
pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState};
