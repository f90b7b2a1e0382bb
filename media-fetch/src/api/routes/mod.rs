//! API route modules.

pub mod config;
pub mod download;
pub mod health;
pub mod metrics;

use axum::Router;
use axum::handler::Handler;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{MethodRouter, get};

use crate::api::server::AppState;

/// `GET` route that also refuses `HEAD`, which axum would otherwise answer
/// by running the `GET` handler.
pub(crate) fn get_only<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    get(handler).head(method_not_allowed)
}

async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET")])
}

/// Create the router with all routes. Every route answers `GET` only.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(download::router())
        .merge(health::router())
        .merge(metrics::router())
        .merge(config::router())
        .with_state(state)
}
