//! Download route.

use axum::{
    Router,
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use tracing::info;

use super::get_only;
use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::pipeline::Deadline;
use crate::{Error, Result};

pub fn router() -> Router<AppState> {
    Router::new().route("/download", get_only(download))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
}

/// `GET /download?url=<identifier>`
async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    match start_download(&state, query.url.as_deref()).await {
        Ok(response) => Ok(response),
        Err(e) => {
            state.metrics.record_failure(e.kind());
            Err(e.into())
        }
    }
}

async fn start_download(state: &AppState, url: Option<&str>) -> Result<Response> {
    let identifier = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::invalid_request("Missing url parameter"))?;
    info!(url = %identifier, "Download requested");

    let permit = state.admission.acquire().await?;
    state.disk_guard.log_usage("Before download");
    state
        .disk_guard
        .check_capacity(state.config.min_disk_space_bytes())?;

    let ready = {
        let deadline = Deadline::new(state.config.download_timeout, &state.shutdown);
        state.pipeline.run(identifier, &deadline).await?
    };

    state.streamer.serve(ready, permit).await
}
