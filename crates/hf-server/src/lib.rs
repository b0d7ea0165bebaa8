//! hf-server: HTTP API, job tracking, and idle-job reaping.
//!
//! This crate ties the other hf-* crates into a running server:
//!
//! - [`jobs::JobTracker`] deduplicates segmenting jobs per output manifest
//! - [`playlist::PlaylistService`] runs the launch / wait / rewrite flow
//! - [`reaper`] stops and cleans up jobs nobody reads any more
//! - Axum routes, with graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod jobs;
pub mod playlist;
pub mod reaper;
pub mod router;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use hf_av::{FfmpegLauncher, ToolRegistry, TranscodeLauncher};
use hf_core::config::Config;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use context::AppContext;
pub use error::AppError;
pub use jobs::{JobKey, JobKind, JobLease, JobReaping, JobSnapshot, JobTracker, ReapGuard};
pub use playlist::{PlaylistResponse, PlaylistService};
pub use state::RequestStreamState;

/// Start the hlsforged server.
///
/// Discovers ffmpeg, builds the [`AppContext`], spawns the idle reaper and
/// serves HTTP until a shutdown signal is received.
pub async fn start(config: Config) -> hf_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let transcode_dir = &config.streaming.transcode_dir;
    if !transcode_dir.exists() {
        std::fs::create_dir_all(transcode_dir)?;
        tracing::info!("Created transcode directory {}", transcode_dir.display());
    }

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    for info in tools.check_all().await {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}; playlists cannot be generated", info.name);
        }
    }

    let launcher: Arc<dyn TranscodeLauncher> = Arc::new(FfmpegLauncher::new(Arc::clone(&tools)));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| hf_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let (ctx, idle_rx) = AppContext::new(config, tools, launcher);
    let reaper_handle = spawn_reaper(&ctx, idle_rx);

    let app = router::build_router(ctx.clone());

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| hf_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    // Cancelling on the signal aborts in-flight manifest waits, so graceful
    // shutdown does not block on them.
    let shutdown = ctx.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal(shutdown.clone()).await;
            shutdown.cancel();
        })
        .await
        .map_err(|e| hf_core::Error::Internal(format!("Server error: {e}")))?;

    ctx.shutdown.cancel();
    let _ = reaper_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Spawn the idle reaper for `ctx`, stopping when `ctx.shutdown` fires.
pub fn spawn_reaper(ctx: &AppContext, idle_rx: mpsc::UnboundedReceiver<JobKey>) -> JoinHandle<()> {
    tokio::spawn(reaper::run_reaper(
        idle_rx,
        ctx.jobs.clone(),
        Arc::clone(&ctx.launcher),
        ctx.config.streaming.idle_grace(),
        ctx.shutdown.clone(),
    ))
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
