use axum::{Json, Router, extract::State};

use super::get_only;
use crate::api::server::AppState;
use crate::metrics::MetricsSnapshot;

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get_only(get_metrics))
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
