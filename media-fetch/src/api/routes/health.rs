//! Health and scratch usage routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::get_only;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get_only(health_check))
        .route("/tmpfs", get_only(tmpfs_usage))
}

/// Healthy while the scratch filesystem keeps the configured free space.
async fn health_check(State(state): State<AppState>) -> Response {
    match state
        .disk_guard
        .check_capacity(state.config.min_disk_space_bytes())
    {
        Ok(_) => (StatusCode::OK, "OK").into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("UNHEALTHY: {}", e)).into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct TmpfsResponse {
    pub total_mb: f64,
    pub used_mb: f64,
    pub available_mb: f64,
    pub usage_percent: f64,
    pub is_available: bool,
}

async fn tmpfs_usage(State(state): State<AppState>) -> Json<TmpfsResponse> {
    let usage = state.disk_guard.usage();
    Json(TmpfsResponse {
        total_mb: usage.total_mb(),
        used_mb: usage.used_mb(),
        available_mb: usage.available_mb(),
        usage_percent: usage.usage_percent,
        is_available: usage.is_available(),
    })
}
