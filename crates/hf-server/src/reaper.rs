//! Stops and cleans up jobs nobody has read for a while.

use std::sync::Arc;
use std::time::Duration;

use hf_av::{cleanup_partial, CleanupReport, TranscodeLauncher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::jobs::{JobKey, JobTracker};

/// Consume idle notifications until `cancel` fires or every sender is gone.
///
/// Each notification schedules one check after `grace`; a job that was picked
/// up again in the meantime is left alone.
pub async fn run_reaper(
    mut idle_rx: mpsc::UnboundedReceiver<JobKey>,
    tracker: JobTracker,
    launcher: Arc<dyn TranscodeLauncher>,
    grace: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(grace_secs = grace.as_secs(), "Idle job reaper started");

    loop {
        tokio::select! {
            key = idle_rx.recv() => {
                let Some(key) = key else { break };
                let tracker = tracker.clone();
                let launcher = Arc::clone(&launcher);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        () = tokio::time::sleep(grace) => {
                            reap_if_idle(&tracker, launcher.as_ref(), &key, grace).await;
                        }
                        () = cancel.cancelled() => {}
                    }
                });
            }
            () = cancel.cancelled() => break,
        }
    }

    tracing::info!("Idle job reaper stopped");
}

/// Reap `key` if it has been idle for `grace`: stop its process, delete its
/// files, then drop the record. Requests for the job wait until all three
/// are done. Returns the cleanup report when the job was reaped.
pub async fn reap_if_idle(
    tracker: &JobTracker,
    launcher: &dyn TranscodeLauncher,
    key: &JobKey,
    grace: Duration,
) -> Option<CleanupReport> {
    let Some(guard) = tracker.begin_reap(key, grace) else {
        tracing::trace!(job = %key, "Job still in use; not reaping");
        return None;
    };

    let stopped = launcher.stop(key.as_path()).await;
    tracing::info!(job = %key, stopped, "Reaping idle job");

    let output = key.as_path().to_path_buf();
    let report = match tokio::task::spawn_blocking(move || cleanup_partial(&output)).await {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(job = %key, error = %e, "Cleanup task failed");
            CleanupReport::default()
        }
    };

    drop(guard);
    Some(report)
}
