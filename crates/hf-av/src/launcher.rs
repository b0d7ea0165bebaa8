//! Background segmenting jobs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;
use crate::transcode::TranscodeArguments;

/// Starts and stops the external process that writes a manifest.
///
/// `launch` returns once the process is running; it does not wait for any
/// output to appear.
#[async_trait]
pub trait TranscodeLauncher: Send + Sync {
    /// Start a job for `arguments.output_path()`.
    async fn launch(&self, arguments: &TranscodeArguments) -> hf_core::Result<()>;

    /// Stop the job writing `output_path`. Returns whether one was running.
    async fn stop(&self, output_path: &Path) -> bool;
}

struct RunningJob {
    generation: u64,
    cancel: CancellationToken,
}

/// Runs ffmpeg for each job and tracks the children by output path.
#[derive(Clone)]
pub struct FfmpegLauncher {
    tools: Arc<ToolRegistry>,
    running: Arc<Mutex<HashMap<PathBuf, RunningJob>>>,
    generation: Arc<AtomicU64>,
}

impl FfmpegLauncher {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            running: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a process is currently writing `output_path`.
    pub fn is_running(&self, output_path: &Path) -> bool {
        self.running.lock().contains_key(output_path)
    }

    /// Number of live processes.
    pub fn running_count(&self) -> usize {
        self.running.lock().len()
    }
}

#[async_trait]
impl TranscodeLauncher for FfmpegLauncher {
    async fn launch(&self, arguments: &TranscodeArguments) -> hf_core::Result<()> {
        let ffmpeg = self.tools.require("ffmpeg")?;
        let output = arguments.output_path().to_path_buf();

        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                hf_core::Error::tool(
                    "ffmpeg",
                    format!("failed to create output dir {}: {e}", dir.display()),
                )
            })?;
        }

        tracing::info!(output = %output.display(), "Launching ffmpeg: {arguments}");

        let mut cmd = ToolCommand::new(ffmpeg.path.clone());
        cmd.args(arguments.args().iter().cloned());
        let mut child = cmd.spawn()?;

        if let Some(stderr) = child.stderr.take() {
            let output = output.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "ffmpeg", output = %output.display(), "{line}");
                }
            });
        }

        let cancel = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let previous = self.running.lock().insert(
            output.clone(),
            RunningJob {
                generation,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::warn!(output = %output.display(), "Replacing a job that was still running");
            previous.cancel.cancel();
        }

        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status.map(Some),
                () = cancel.cancelled() => child.kill().await.map(|()| None),
            };

            match status {
                Ok(Some(status)) if status.success() => {
                    tracing::info!(output = %output.display(), "ffmpeg finished");
                }
                Ok(Some(status)) => {
                    tracing::warn!(output = %output.display(), %status, "ffmpeg exited with failure");
                }
                Ok(None) => {
                    tracing::info!(output = %output.display(), "ffmpeg stopped");
                }
                Err(e) => {
                    tracing::warn!(output = %output.display(), error = %e, "Failed to wait for ffmpeg");
                }
            }

            let mut running = running.lock();
            if running
                .get(&output)
                .is_some_and(|job| job.generation == generation)
            {
                running.remove(&output);
            }
        });

        Ok(())
    }

    async fn stop(&self, output_path: &Path) -> bool {
        match self.running.lock().remove(output_path) {
            Some(job) => {
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }
}
