//! Concurrency tests for the job tracker under a multi-threaded runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hf_server::{JobKey, JobKind, JobTracker};
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_task_starts_a_job() {
    let tracker = JobTracker::new();
    let key = JobKey::new("/t/abc-video.m3u8");
    let starters = Arc::new(AtomicUsize::new(0));
    let arrived = Arc::new(Barrier::new(32));
    let joined = Arc::new(Barrier::new(32));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let tracker = tracker.clone();
            let key = key.clone();
            let starters = Arc::clone(&starters);
            let arrived = Arc::clone(&arrived);
            let joined = Arc::clone(&joined);
            tokio::spawn(async move {
                arrived.wait().await;
                let (lease, started) = tracker.ensure_started(key, JobKind::Video).unwrap();
                if started {
                    starters.fetch_add(1, Ordering::SeqCst);
                }
                // Nobody releases before everyone has joined.
                joined.wait().await;
                drop(lease);
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(starters.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.active_requests(&key), Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn leases_balance_across_many_jobs() {
    let tracker = JobTracker::new();

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                let key = JobKey::new(format!("/t/job{}-audio.m3u8", i % 4));
                let _lease = tracker.begin_request(key, JobKind::Audio).unwrap();
                tokio::task::yield_now().await;
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(tracker.len(), 4);
    assert!(tracker
        .snapshot()
        .iter()
        .all(|job| job.active_requests == 0));
}

#[tokio::test]
async fn aborted_request_releases_its_lease() {
    let tracker = JobTracker::new();
    let key = JobKey::new("/t/abc-video.m3u8");

    let holder = {
        let tracker = tracker.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let _lease = tracker.begin_request(key, JobKind::Video).unwrap();
            std::future::pending::<()>().await;
        })
    };

    while tracker.active_requests(&key) != Some(1) {
        tokio::task::yield_now().await;
    }

    holder.abort();
    assert!(holder.await.unwrap_err().is_cancelled());
    assert_eq!(tracker.active_requests(&key), Some(0));
    assert!(tracker.begin_reap(&key, Duration::ZERO).is_some());
}
