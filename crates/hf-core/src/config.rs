//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries all
//! sub-configs for the server, the media library, external tools and the
//! streaming core. Every section defaults sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub tools: ToolsConfig,
    pub streaming: StreamingConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if !self.library.root.exists() {
            warnings.push(format!(
                "library.root {} does not exist",
                self.library.root.display()
            ));
        }

        if let Some(ref ffmpeg) = self.tools.ffmpeg_path {
            if !ffmpeg.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path {} does not exist; falling back to PATH",
                    ffmpeg.display()
                ));
            }
        }

        if self.streaming.poll_interval_ms == 0 {
            warnings.push("streaming.poll_interval_ms is 0; manifest polling will spin".into());
        }

        if self.streaming.min_segments == 0 {
            warnings.push(
                "streaming.min_segments is 0; playlists are served before any segment exists"
                    .into(),
            );
        }

        if self.streaming.manifest_wait_timeout_secs == 0 {
            warnings.push(
                "streaming.manifest_wait_timeout_secs is 0; requests wait for the manifest indefinitely"
                    .into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8096,
        }
    }
}

/// Where source media lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub root: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./media"),
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
}

/// Settings for the on-demand segmenting core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Directory receiving manifests and segments.
    pub transcode_dir: PathBuf,
    /// Delay between manifest polls while waiting for a new playlist.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Number of `#EXTINF:` markers a fresh playlist needs before it is served.
    #[serde(default = "default_min_segments")]
    pub min_segments: usize,
    /// Upper bound a request waits for a fresh playlist (0 = unbounded).
    #[serde(default = "default_manifest_wait_timeout")]
    pub manifest_wait_timeout_secs: u64,
    /// How long a job may sit without readers before it is reaped.
    #[serde(default = "default_idle_grace")]
    pub idle_grace_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    25
}
fn default_min_segments() -> usize {
    3
}
fn default_manifest_wait_timeout() -> u64 {
    60
}
fn default_idle_grace() -> u64 {
    30
}

impl StreamingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `None` means the caller imposes no bound.
    pub fn manifest_wait_timeout(&self) -> Option<Duration> {
        (self.manifest_wait_timeout_secs > 0)
            .then(|| Duration::from_secs(self.manifest_wait_timeout_secs))
    }

    pub fn idle_grace(&self) -> Duration {
        Duration::from_secs(self.idle_grace_secs)
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            transcode_dir: PathBuf::from("./data/transcodes"),
            poll_interval_ms: default_poll_interval_ms(),
            min_segments: default_min_segments(),
            manifest_wait_timeout_secs: default_manifest_wait_timeout(),
            idle_grace_secs: default_idle_grace(),
        }
    }
}
