//! API server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::Request};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::Result;
use crate::api::artifact::ArtifactStreamer;
use crate::api::routes;
use crate::config::Config;
use crate::disk::DiskGuard;
use crate::metrics::MetricsCollector;
use crate::pipeline::{AdmissionController, Pipeline};

/// Path excluded from request tracing.
const HEALTH_PATH: &str = "/health";

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ApiServerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port: config.server_port,
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub admission: AdmissionController,
    pub disk_guard: DiskGuard,
    pub pipeline: Arc<Pipeline>,
    pub streamer: ArtifactStreamer,
    pub metrics: Arc<MetricsCollector>,
    /// Root token; cancelling it aborts in-flight pipelines.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        disk_guard: DiskGuard,
        pipeline: Arc<Pipeline>,
        metrics: Arc<MetricsCollector>,
        shutdown: CancellationToken,
    ) -> Self {
        let admission = AdmissionController::new(config.max_concurrent, config.admission_wait);
        let streamer = ArtifactStreamer::new(config.buffer_size, metrics.clone(), disk_guard.clone());
        Self {
            config,
            admission,
            disk_guard,
            pipeline,
            streamer,
            metrics,
            shutdown,
        }
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    /// Create a server that stops when the state's shutdown token fires.
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        let cancel_token = state.shutdown.clone();
        Self {
            config,
            state,
            cancel_token,
        }
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        routes::create_router(self.state.clone()).layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if req.uri().path() == HEALTH_PATH {
                        Span::none()
                    } else {
                        let mut make_span =
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                        use tower_http::trace::MakeSpan;
                        make_span.make_span(req)
                    }
                })
                .on_request(|req: &Request, span: &Span| {
                    if span.is_disabled() || req.uri().path() == HEALTH_PATH {
                        return;
                    }
                    let mut on_request =
                        tower_http::trace::DefaultOnRequest::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnRequest;
                    on_request.on_request(req, span);
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let on_response =
                            tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                        use tower_http::trace::OnResponse;
                        on_response.on_response(res, latency, span);
                    },
                )
                .on_failure(
                    |class: tower_http::classify::ServerErrorsFailureClass,
                     latency: Duration,
                     span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let mut on_failure =
                            tower_http::trace::DefaultOnFailure::new().level(tracing::Level::ERROR);
                        use tower_http::trace::OnFailure;
                        on_failure.on_failure(class, latency, span);
                    },
                ),
        )
    }

    /// Start the server and serve until the cancellation token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| crate::Error::config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| crate::Error::Other(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("Server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("Server shutting down...");
            })
            .await
            .map_err(|e| crate::Error::Other(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Shutdown the server and everything sharing its token.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_from_config() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 7839);
    }
}
