//! Polling reader for manifests that another process is still writing.

use std::io;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use hf_core::{Error, Result};
use tokio::io::AsyncReadExt;

use super::SEGMENT_MARKER;

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Default number of segment markers a fresh manifest needs.
pub const DEFAULT_MIN_SEGMENTS: usize = 3;

/// Number of `#EXTINF:` markers in `text`.
pub fn count_segments(text: &str) -> usize {
    text.matches(SEGMENT_MARKER).count()
}

/// Where manifest text comes from.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Read the whole current contents of `path`.
    async fn read_text(&self, path: &Path) -> io::Result<String>;
}

/// Reads manifests from disk without ever blocking the writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

#[async_trait]
impl ManifestSource for FileSource {
    async fn read_text(&self, path: &Path) -> io::Result<String> {
        let mut options = tokio::fs::OpenOptions::new();
        options.read(true);
        #[cfg(windows)]
        {
            // FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE
            options.share_mode(0x7);
        }

        let mut file = options.open(path).await?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await?;

        // ffmpeg may be mid-append inside a multi-byte character.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Reads a manifest, optionally polling until it lists enough segments.
#[derive(Debug, Clone)]
pub struct PlaylistReader<S = FileSource> {
    source: S,
    poll_interval: Duration,
    min_segments: usize,
}

impl PlaylistReader<FileSource> {
    /// Disk-backed reader with the given polling parameters.
    pub fn new(poll_interval: Duration, min_segments: usize) -> Self {
        Self::with_source(FileSource, poll_interval, min_segments)
    }
}

impl Default for PlaylistReader<FileSource> {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MIN_SEGMENTS)
    }
}

impl<S: ManifestSource> PlaylistReader<S> {
    pub fn with_source(source: S, poll_interval: Duration, min_segments: usize) -> Self {
        Self {
            source,
            poll_interval,
            min_segments,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn min_segments(&self) -> usize {
        self.min_segments
    }

    /// Return the manifest text at `path`.
    ///
    /// Without `wait_for_minimum_segments` the first successful read is
    /// returned. With it, the reader sleeps and retries until the text holds
    /// at least `min_segments` markers; a missing file counts as zero. There
    /// is no built-in timeout: callers bound the wait by dropping the future.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the file is missing and the caller is not
    /// waiting; [`Error::Io`] for any other read failure.
    pub async fn read_manifest(&self, path: &Path, wait_for_minimum_segments: bool) -> Result<String> {
        let mut polls: u64 = 0;
        loop {
            match self.source.read_text(path).await {
                Ok(text) => {
                    if !wait_for_minimum_segments {
                        return Ok(text);
                    }
                    let segments = count_segments(&text);
                    if segments >= self.min_segments {
                        tracing::debug!(
                            path = %path.display(),
                            segments,
                            polls,
                            "Manifest ready"
                        );
                        return Ok(text);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if !wait_for_minimum_segments {
                        return Err(Error::not_found("manifest", path.display()));
                    }
                }
                Err(e) => return Err(e.into()),
            }

            polls += 1;
            tracing::trace!(path = %path.display(), polls, "Waiting for manifest segments");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
