use axum::{Json, Router, extract::State};

use super::get_only;
use crate::api::server::AppState;
use crate::config::Config;

pub fn router() -> Router<AppState> {
    Router::new().route("/config", get_only(get_config))
}

/// Read-only dump of the active configuration.
async fn get_config(State(state): State<AppState>) -> Json<Config> {
    Json(state.config.as_ref().clone())
}
