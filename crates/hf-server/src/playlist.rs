//! Request flow for serving a playlist that may still be growing.
//!
//! 1. If the output manifest is missing, register the job; the request that
//!    registers it (or finds it idle) builds the arguments and launches the
//!    transcode. Every request on this path waits for the minimum segment
//!    count.
//! 2. If the manifest exists, join the job and read it as-is.
//! 3. A job being reaped is waited out, then step 1 or 2 is retried.
//! 4. Rewrite the text and release the lease, whatever the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hf_av::{build_arguments, TranscodeLauncher};
use hf_core::{Error, Result, StreamRequest};
use hf_media::{PlaylistReader, PlaylistTransformer, PlaylistType};
use tokio_util::sync::CancellationToken;

use crate::jobs::{JobKey, JobReaping, JobTracker};
use crate::state::RequestStreamState;

/// A rewritten manifest ready to send.
#[derive(Debug, Clone)]
pub struct PlaylistResponse {
    pub body: String,
    pub playlist_type: PlaylistType,
    /// Whether this request launched the transcode.
    pub started: bool,
    pub output_path: PathBuf,
}

/// Serves playlists for [`StreamRequest`]s.
pub struct PlaylistService {
    tracker: JobTracker,
    launcher: Arc<dyn TranscodeLauncher>,
    reader: PlaylistReader,
    transformer: PlaylistTransformer,
    library_root: PathBuf,
    transcode_dir: PathBuf,
    wait_timeout: Option<Duration>,
}

impl PlaylistService {
    pub fn new(
        tracker: JobTracker,
        launcher: Arc<dyn TranscodeLauncher>,
        reader: PlaylistReader,
        library_root: PathBuf,
        transcode_dir: PathBuf,
    ) -> Self {
        Self {
            tracker,
            launcher,
            reader,
            transformer: PlaylistTransformer::new(),
            library_root,
            transcode_dir,
            wait_timeout: None,
        }
    }

    /// Bound how long a request waits for a fresh manifest.
    pub fn with_wait_timeout(mut self, wait_timeout: Option<Duration>) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn transcode_dir(&self) -> &Path {
        &self.transcode_dir
    }

    /// Output manifest that `request` is served from.
    pub fn output_path(&self, request: &StreamRequest) -> Result<PathBuf> {
        let input = self.library_root.join(request.relative_item_path()?);
        let state = RequestStreamState::new(request.clone(), input)?;
        Ok(state.output_path(&self.transcode_dir))
    }

    /// Produce the playlist for `request`.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] / [`Error::NotFound`] for bad or unknown items.
    /// - [`Error::Tool`] when the transcode cannot be launched; the job
    ///   registration is rolled back.
    /// - [`Error::Timeout`] when the configured wait bound expires.
    /// - [`Error::Cancelled`] when `cancel` fires while waiting for the
    ///   manifest or for a reap in progress.
    pub async fn serve(
        &self,
        request: &StreamRequest,
        cancel: &CancellationToken,
    ) -> Result<PlaylistResponse> {
        let input = self.library_root.join(request.relative_item_path()?);
        if !tokio::fs::try_exists(&input).await? {
            return Err(Error::not_found("media", &request.item));
        }

        let state = RequestStreamState::new(request.clone(), input)?;
        let output = state.output_path(&self.transcode_dir);
        let key = JobKey::new(output.clone());
        let kind = state.kind();

        let (lease, wait, started) = loop {
            let admission = if tokio::fs::try_exists(&output).await? {
                self.tracker
                    .begin_request(key.clone(), kind)
                    .map(|lease| (lease, false, false))
            } else {
                self.tracker
                    .ensure_started(key.clone(), kind)
                    .map(|(lease, started)| (lease, true, started))
            };
            match admission {
                Ok(admitted) => break admitted,
                Err(reaping) => self.await_reap(&reaping, cancel).await?,
            }
        };

        if started {
            let arguments = build_arguments(&state, &output);
            if let Err(e) = self.launcher.launch(&arguments).await {
                tracing::error!(output = %output.display(), error = %e, "Failed to launch transcode");
                lease.rollback();
                return Err(e);
            }
        }

        tracing::debug!(
            job = %lease.key(),
            started,
            wait,
            "Reading manifest"
        );

        let raw = self.read(&output, wait, cancel).await?;
        let dir = output.parent().unwrap_or_else(|| Path::new(""));
        let body = self.transformer.transform(&raw, dir);
        let playlist_type = PlaylistType::detect(&body);
        drop(lease);

        Ok(PlaylistResponse {
            body,
            playlist_type,
            started,
            output_path: output,
        })
    }

    async fn await_reap(&self, reaping: &JobReaping, cancel: &CancellationToken) -> Result<()> {
        tracing::debug!(job = %reaping.key(), "Job is being reaped; waiting");
        tokio::select! {
            () = reaping.finished() => Ok(()),
            () = cancel.cancelled() => Err(Error::Cancelled(format!(
                "stopped waiting for job {} to be reaped",
                reaping.key()
            ))),
        }
    }

    async fn read(&self, output: &Path, wait: bool, cancel: &CancellationToken) -> Result<String> {
        let read = self.reader.read_manifest(output, wait);
        let bounded = async {
            match self.wait_timeout.filter(|_| wait) {
                Some(limit) => tokio::time::timeout(limit, read).await.map_err(|_| {
                    Error::timeout(limit, format!("manifest {}", output.display()))
                })?,
                None => read.await,
            }
        };

        tokio::select! {
            result = bounded => result,
            () = cancel.cancelled() => Err(Error::Cancelled(format!(
                "stopped waiting for manifest {}",
                output.display()
            ))),
        }
    }
}
