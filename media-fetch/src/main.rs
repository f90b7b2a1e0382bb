use std::sync::Arc;

use anyhow::Context;
use media_catalog::{HttpStreamSource, ManifestResolver, http::default_client};
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use media_fetch::api::{ApiServer, ApiServerConfig, AppState};
use media_fetch::config::Config;
use media_fetch::disk::DiskGuard;
use media_fetch::logging::{self, LogFormat};
use media_fetch::metrics::MetricsCollector;
use media_fetch::pipeline::{FfmpegMuxer, Pipeline, ScratchJanitor};
use media_fetch::utils::fs;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let _log_guard = logging::init_logging(LogFormat::from_env())?;

    let config = Arc::new(Config::from_env_or_default());
    info!(
        "Starting media-fetch (max height: {}p, max concurrent: {}, preset: {})",
        config.max_video_height, config.max_concurrent, config.ffmpeg_preset
    );

    // Scratch directory must be usable before accepting traffic
    fs::ensure_dir_all(&config.temp_dir)
        .await
        .context("failed to create scratch directory")?;
    fs::ensure_writable(&config.temp_dir).context("scratch directory is not writable")?;

    let disk_guard = DiskGuard::system(&config.temp_dir);
    disk_guard
        .check_capacity(config.min_disk_space_bytes())
        .context("insufficient disk space at startup")?;
    disk_guard.log_usage("Startup");

    let shutdown = CancellationToken::new();
    let metrics = Arc::new(MetricsCollector::new());

    let janitor = Arc::new(ScratchJanitor::new(
        &config.temp_dir,
        config.max_file_age,
        disk_guard.clone(),
    ));
    let janitor_handle = janitor.start(config.cleanup_interval, shutdown.clone());

    let client = default_client().context("failed to build HTTP client")?;
    let pipeline = Arc::new(Pipeline::new(
        &config,
        disk_guard.clone(),
        Arc::new(ManifestResolver::new(client.clone())),
        Arc::new(HttpStreamSource::new(client)),
        Arc::new(FfmpegMuxer::new(config.ffmpeg_path.clone())),
    ));

    let state = AppState::new(
        config.clone(),
        disk_guard,
        pipeline,
        metrics,
        shutdown.clone(),
    );
    let server = ApiServer::new(ApiServerConfig::from_config(&config), state);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let result = server.run().await;
    server.shutdown();
    if let Err(e) = janitor_handle.await {
        error!("Janitor task failed: {}", e);
    }

    result?;
    info!("media-fetch stopped");
    Ok(())
}
