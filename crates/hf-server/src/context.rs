//! Shared application state.
//!
//! [`AppContext`] is handed to every route handler via Axum state. All
//! long-lived services are constructed once here and shared through `Arc`s.

use std::sync::Arc;

use hf_av::{ToolRegistry, TranscodeLauncher};
use hf_core::config::Config;
use hf_media::PlaylistReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::jobs::{JobKey, JobTracker};
use crate::playlist::PlaylistService;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub tools: Arc<ToolRegistry>,
    pub jobs: JobTracker,
    pub launcher: Arc<dyn TranscodeLauncher>,
    pub playlists: Arc<PlaylistService>,
    /// Fires on server shutdown; aborts manifest waits.
    pub shutdown: CancellationToken,
}

impl AppContext {
    /// Build the context and the receiving end of the tracker's idle
    /// notifications, which belongs to the reaper.
    pub fn new(
        config: Config,
        tools: Arc<ToolRegistry>,
        launcher: Arc<dyn TranscodeLauncher>,
    ) -> (Self, mpsc::UnboundedReceiver<JobKey>) {
        let (idle_tx, idle_rx) = mpsc::unbounded_channel();
        let jobs = JobTracker::with_idle_notifier(idle_tx);

        let streaming = &config.streaming;
        let playlists = PlaylistService::new(
            jobs.clone(),
            Arc::clone(&launcher),
            PlaylistReader::new(streaming.poll_interval(), streaming.min_segments),
            config.library.root.clone(),
            streaming.transcode_dir.clone(),
        )
        .with_wait_timeout(streaming.manifest_wait_timeout());

        let ctx = Self {
            config: Arc::new(config),
            tools,
            jobs,
            launcher,
            playlists: Arc::new(playlists),
            shutdown: CancellationToken::new(),
        };
        (ctx, idle_rx)
    }
}
