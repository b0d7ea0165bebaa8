//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which lays out a temporary media library and
//! transcode directory and builds a full [`AppContext`] around a
//! [`ScriptedLauncher`] standing in for ffmpeg. The [`TestHarness::with_server`]
//! constructor starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use hf_av::{ToolRegistry, TranscodeArguments, TranscodeLauncher};
use hf_core::config::Config;
use hf_server::context::AppContext;
use hf_server::router::build_router;

/// Fake transcoder: writes one more segment (file plus manifest entry) every
/// `segment_interval`, optionally closing the list after `finish_after`.
pub struct ScriptedLauncher {
    segment_interval: Duration,
    finish_after: Option<usize>,
    fail: bool,
    launches: AtomicUsize,
    writers: Mutex<HashMap<PathBuf, JoinHandle<()>>>,
}

impl ScriptedLauncher {
    pub fn growing(segment_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            segment_interval,
            finish_after: None,
            fail: false,
            launches: AtomicUsize::new(0),
            writers: Mutex::new(HashMap::new()),
        })
    }

    pub fn finishing(segment_interval: Duration, segments: usize) -> Arc<Self> {
        Arc::new(Self {
            segment_interval,
            finish_after: Some(segments),
            fail: false,
            launches: AtomicUsize::new(0),
            writers: Mutex::new(HashMap::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            segment_interval: Duration::from_millis(10),
            finish_after: None,
            fail: true,
            launches: AtomicUsize::new(0),
            writers: Mutex::new(HashMap::new()),
        })
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

fn manifest_text(dir: &Path, stem: &str, ext: &str, segments: usize, finished: bool) -> String {
    let mut text = String::from(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-ALLOW-CACHE:YES\n#EXT-X-TARGETDURATION:10\n",
    );
    for i in 0..segments {
        text.push_str("#EXTINF:10.000000,\n");
        text.push_str(&format!("{}/segment-{stem}{i:03}.{ext}\n", dir.display()));
    }
    if finished {
        text.push_str("#EXT-X-ENDLIST\n");
    }
    text
}

#[async_trait]
impl TranscodeLauncher for ScriptedLauncher {
    async fn launch(&self, arguments: &TranscodeArguments) -> hf_core::Result<()> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(hf_core::Error::tool("ffmpeg", "failed to spawn: scripted failure"));
        }

        let output = arguments.output_path().to_path_buf();
        let dir = output.parent().unwrap().to_path_buf();
        let stem = output.file_stem().unwrap().to_string_lossy().into_owned();
        let ext = arguments.container().extension();
        let interval = self.segment_interval;
        let finish_after = self.finish_after;
        tokio::fs::create_dir_all(&dir).await?;

        let manifest = output.clone();
        let writer = tokio::spawn(async move {
            let staging = manifest.with_extension("m3u8.tmp");
            for segments in 1.. {
                tokio::time::sleep(interval).await;
                let segment = dir.join(format!("segment-{stem}{:03}.{ext}", segments - 1));
                tokio::fs::write(&segment, b"segment").await.unwrap();

                let finished = finish_after.is_some_and(|n| segments >= n);
                let text = manifest_text(&dir, &stem, ext, segments, finished);
                tokio::fs::write(&staging, text).await.unwrap();
                tokio::fs::rename(&staging, &manifest).await.unwrap();
                if finished {
                    break;
                }
            }
        });

        self.writers.lock().insert(output, writer);
        Ok(())
    }

    async fn stop(&self, output_path: &Path) -> bool {
        match self.writers.lock().remove(output_path) {
            Some(writer) => {
                writer.abort();
                true
            }
            None => false,
        }
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub launcher: Arc<ScriptedLauncher>,
    pub dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a harness whose library holds `show.mkv` and `album.flac`.
    pub fn new(launcher: Arc<ScriptedLauncher>) -> Self {
        Self::with_config(launcher, |_| {})
    }

    /// Like [`new`](Self::new), letting the caller adjust the config.
    pub fn with_config(launcher: Arc<ScriptedLauncher>, adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let library = dir.path().join("media");
        std::fs::create_dir_all(&library).unwrap();
        std::fs::write(library.join("show.mkv"), b"video").unwrap();
        std::fs::write(library.join("album.flac"), b"audio").unwrap();

        let mut config = Config::default();
        config.library.root = library;
        config.streaming.transcode_dir = dir.path().join("transcodes");
        config.streaming.poll_interval_ms = 5;
        config.streaming.manifest_wait_timeout_secs = 10;
        adjust(&mut config);

        let tools = Arc::new(ToolRegistry::default());
        let (ctx, idle_rx) = AppContext::new(config, tools, launcher.clone());
        hf_server::spawn_reaper(&ctx, idle_rx);

        Self { ctx, launcher, dir }
    }

    /// Start an Axum server on a random port and return the bound address.
    pub async fn serve(&self) -> SocketAddr {
        let app = build_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        addr
    }

    /// Start a harness around `launcher` together with its server.
    pub async fn with_server(launcher: Arc<ScriptedLauncher>) -> (Self, SocketAddr) {
        let harness = Self::new(launcher);
        let addr = harness.serve().await;
        (harness, addr)
    }

    pub fn transcode_dir(&self) -> PathBuf {
        self.ctx.config.streaming.transcode_dir.clone()
    }

    /// Names of the files currently in the transcode directory.
    pub fn transcode_files(&self) -> Vec<String> {
        match std::fs::read_dir(self.transcode_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
