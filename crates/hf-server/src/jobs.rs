//! Registry of segmenting jobs, keyed by output manifest.
//!
//! Every playlist request holds a [`JobLease`] for the job it reads from.
//! The first request for an output starts the job; later ones join it. When
//! the last lease is released the job stays registered as idle and its key
//! is handed to the idle notifier, so the reaper can decide what to do with
//! the process and its files. An idle job asked to start again is restarted.
//!
//! While a job is being reaped its record stays in place, marked, and every
//! request for it is turned away with [`JobReaping`] until the reap is done.
//! The tracker itself never touches the disk.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hf_core::SegmentContainer;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Output manifest path identifying one job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobKey(PathBuf);

impl JobKey {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self(output_path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for JobKey {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// What a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Video,
    Audio,
}

impl JobKind {
    pub fn for_container(container: SegmentContainer) -> Self {
        if container.has_video() {
            Self::Video
        } else {
            Self::Audio
        }
    }
}

#[derive(Debug)]
struct JobRecord {
    kind: Option<JobKind>,
    active_requests: usize,
    started_at: DateTime<Utc>,
    last_released_at: Option<DateTime<Utc>>,
    idle_since: Option<Instant>,
    /// Set while the reaper owns the job; cancelled once it is gone.
    reaping: Option<CancellationToken>,
}

impl JobRecord {
    fn new(kind: Option<JobKind>) -> Self {
        Self {
            kind,
            active_requests: 0,
            started_at: Utc::now(),
            last_released_at: None,
            idle_since: None,
            reaping: None,
        }
    }

    fn acquire(&mut self) {
        self.active_requests += 1;
        self.idle_since = None;
    }

    fn restart(&mut self, kind: JobKind) {
        self.kind = Some(kind);
        self.started_at = Utc::now();
    }

    fn check_admission(&self, key: &JobKey) -> Result<(), JobReaping> {
        match &self.reaping {
            Some(done) => Err(JobReaping {
                key: key.clone(),
                done: done.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// A request hit a job while the reaper was tearing it down.
#[derive(Debug, Clone)]
pub struct JobReaping {
    key: JobKey,
    done: CancellationToken,
}

impl JobReaping {
    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// Resolves once the job's record is gone and its files are cleaned up.
    pub async fn finished(&self) {
        self.done.cancelled().await;
    }
}

/// Point-in-time view of one job.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct JobSnapshot {
    /// Output manifest path.
    #[schema(value_type = String)]
    pub key: JobKey,
    pub kind: Option<JobKind>,
    pub active_requests: usize,
    #[schema(value_type = String)]
    pub started_at: DateTime<Utc>,
    #[schema(value_type = Option<String>)]
    pub last_released_at: Option<DateTime<Utc>>,
    pub reaping: bool,
}

struct TrackerInner {
    jobs: Mutex<HashMap<JobKey, JobRecord>>,
    idle_tx: Option<mpsc::UnboundedSender<JobKey>>,
}

/// Shared, cheaply cloneable job registry.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<TrackerInner>,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTracker {
    /// Tracker without an idle notifier.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                jobs: Mutex::new(HashMap::new()),
                idle_tx: None,
            }),
        }
    }

    /// Tracker that sends every key whose last lease was released to `idle_tx`.
    pub fn with_idle_notifier(idle_tx: mpsc::UnboundedSender<JobKey>) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                jobs: Mutex::new(HashMap::new()),
                idle_tx: Some(idle_tx),
            }),
        }
    }

    /// Join the job for `key`, registering it if nobody has yet.
    ///
    /// Returns `true` exactly once per registration: that caller must launch
    /// the job. Every other caller gets `false` and a lease on the existing
    /// job until its lease count returns to zero; an idle job counts as not
    /// running, so the next caller restarts it.
    ///
    /// # Errors
    ///
    /// [`JobReaping`] while the job is being torn down.
    pub fn ensure_started(
        &self,
        key: JobKey,
        kind: JobKind,
    ) -> Result<(JobLease, bool), JobReaping> {
        let (started, restarted) = {
            let mut jobs = self.inner.jobs.lock();
            match jobs.get_mut(&key) {
                Some(record) => {
                    record.check_admission(&key)?;
                    let idle = record.active_requests == 0;
                    if idle {
                        record.restart(kind);
                    }
                    record.acquire();
                    (idle, idle)
                }
                None => {
                    let mut record = JobRecord::new(Some(kind));
                    record.acquire();
                    jobs.insert(key.clone(), record);
                    (true, false)
                }
            }
        };

        if restarted {
            tracing::info!(job = %key, ?kind, "Restarting idle job");
        } else if started {
            tracing::info!(job = %key, ?kind, "Registered new job");
        }
        Ok((self.lease(key), started))
    }

    /// Join the job for `key`, creating a record if none exists.
    ///
    /// `kind` is recorded only if the job does not have one yet.
    ///
    /// # Errors
    ///
    /// [`JobReaping`] while the job is being torn down.
    pub fn begin_request(&self, key: JobKey, kind: JobKind) -> Result<JobLease, JobReaping> {
        {
            let mut jobs = self.inner.jobs.lock();
            let record = jobs
                .entry(key.clone())
                .or_insert_with(|| JobRecord::new(None));
            record.check_admission(&key)?;
            record.kind.get_or_insert(kind);
            record.acquire();
        }
        Ok(self.lease(key))
    }

    fn lease(&self, key: JobKey) -> JobLease {
        JobLease {
            tracker: self.clone(),
            key,
            released: false,
        }
    }

    fn end_request(&self, key: &JobKey) {
        let now_idle = {
            let mut jobs = self.inner.jobs.lock();
            let Some(record) = jobs.get_mut(key) else {
                tracing::warn!(job = %key, "Released a lease on an unknown job");
                return;
            };
            if record.active_requests == 0 {
                tracing::warn!(job = %key, "Released a lease on a job with no active requests");
                return;
            }
            record.active_requests -= 1;
            record.last_released_at = Some(Utc::now());
            if record.active_requests == 0 {
                record.idle_since = Some(Instant::now());
                true
            } else {
                false
            }
        };

        if now_idle {
            tracing::debug!(job = %key, "Job is idle");
            if let Some(tx) = &self.inner.idle_tx {
                if tx.send(key.clone()).is_err() {
                    tracing::debug!(job = %key, "Idle notifier closed");
                }
            }
        }
    }

    fn rollback(&self, key: &JobKey) {
        let mut jobs = self.inner.jobs.lock();
        let Some(record) = jobs.get_mut(key) else {
            return;
        };
        record.active_requests = record.active_requests.saturating_sub(1);
        if record.active_requests == 0 {
            jobs.remove(key);
            tracing::info!(job = %key, "Job registration rolled back");
        } else {
            record.last_released_at = Some(Utc::now());
        }
    }

    /// Hand `key` to the reaper if nobody holds it and it has been idle for
    /// at least `idle_for`.
    ///
    /// The record stays registered, marked as reaping, until the returned
    /// guard is dropped; requests arriving meanwhile get [`JobReaping`].
    pub fn begin_reap(&self, key: &JobKey, idle_for: Duration) -> Option<ReapGuard> {
        let mut jobs = self.inner.jobs.lock();
        let record = jobs.get_mut(key)?;
        let expired = record.reaping.is_none()
            && record.active_requests == 0
            && record
                .idle_since
                .is_some_and(|since| since.elapsed() >= idle_for);
        if !expired {
            return None;
        }

        let done = CancellationToken::new();
        record.reaping = Some(done.clone());
        Some(ReapGuard {
            tracker: self.clone(),
            key: key.clone(),
            done,
        })
    }

    fn finish_reap(&self, key: &JobKey, done: &CancellationToken) {
        self.inner.jobs.lock().remove(key);
        done.cancel();
        tracing::debug!(job = %key, "Job reaped");
    }

    /// Lease count for `key`, or `None` if it is not tracked.
    pub fn active_requests(&self, key: &JobKey) -> Option<usize> {
        self.inner
            .jobs
            .lock()
            .get(key)
            .map(|record| record.active_requests)
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.inner.jobs.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All tracked jobs, ordered by key.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self
            .inner
            .jobs
            .lock()
            .iter()
            .map(|(key, record)| JobSnapshot {
                key: key.clone(),
                kind: record.kind,
                active_requests: record.active_requests,
                started_at: record.started_at,
                last_released_at: record.last_released_at,
                reaping: record.reaping.is_some(),
            })
            .collect();
        jobs.sort_by(|a, b| a.key.0.cmp(&b.key.0));
        jobs
    }
}

/// One request's hold on a job.
///
/// Dropping the lease releases it, on every exit path including errors and
/// cancellation.
pub struct JobLease {
    tracker: JobTracker,
    key: JobKey,
    released: bool,
}

impl JobLease {
    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// Release the lease after a failed launch. If no other request holds the
    /// job, the record is removed instead of going idle.
    pub fn rollback(mut self) {
        self.released = true;
        self.tracker.rollback(&self.key);
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.tracker.end_request(&self.key);
        }
    }
}

/// Exclusive hold of the reaper on an idle job.
///
/// Dropping it removes the record and lets waiting requests retry.
pub struct ReapGuard {
    tracker: JobTracker,
    key: JobKey,
    done: CancellationToken,
}

impl ReapGuard {
    pub fn key(&self) -> &JobKey {
        &self.key
    }
}

impl Drop for ReapGuard {
    fn drop(&mut self) {
        self.tracker.finish_reap(&self.key, &self.done);
    }
}

impl fmt::Debug for JobLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobLease")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish()
    }
}
