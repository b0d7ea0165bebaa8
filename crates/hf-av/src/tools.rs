//! External tool detection.
//!
//! The [`ToolRegistry`] discovers and caches the location of ffmpeg and
//! provides lookup methods for the rest of the crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;

/// How long `-version` may take before the tool is reported without one.
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &["ffmpeg"];

/// A resolved external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    #[schema(value_type = Option<String>)]
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// A configured path is used when it exists; otherwise [`which::which`]
    /// locates the tool in `PATH`. Tools that are not found are omitted.
    pub fn discover(tools_config: &hf_core::config::ToolsConfig) -> Self {
        let mut registry = Self::default();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(tool = name, path = %p.display(), "Configured tool path missing; searching PATH");
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match resolved {
                Some(path) => {
                    tracing::debug!(tool = name, path = %path.display(), "Tool discovered");
                    registry = registry.with_tool(name, path);
                }
                None => tracing::debug!(tool = name, "Tool not found"),
            }
        }

        registry
    }

    /// Register `name` at an explicit path, replacing any earlier entry.
    pub fn with_tool(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        self.tools.insert(
            name.clone(),
            ToolConfig {
                name,
                path: path.into(),
            },
        );
        self
    }

    /// Return the [`ToolConfig`] for the given tool, or an
    /// [`hf_core::Error::Tool`] if it was not found during discovery.
    pub fn require(&self, name: &str) -> hf_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            hf_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Check all known tools and return availability information.
    pub async fn check_all(&self) -> Vec<ToolInfo> {
        let mut infos = Vec::with_capacity(KNOWN_TOOLS.len());
        for &name in KNOWN_TOOLS {
            let info = match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(&cfg.path).await,
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            };
            infos.push(info);
        }
        infos
    }

    /// Iterate over all registered tool configs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ToolConfig)> {
        self.tools.iter()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
async fn detect_version(path: &Path) -> Option<String> {
    let output = ToolCommand::new(path.to_path_buf())
        .arg("-version")
        .timeout(VERSION_TIMEOUT)
        .execute()
        .await
        .ok()?;

    output.stdout.lines().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_core::config::ToolsConfig;

    #[tokio::test]
    async fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        // ffmpeg may not be installed; the call itself must not panic.
        let infos = registry.check_all().await;
        assert_eq!(infos.len(), KNOWN_TOOLS.len());
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::default();
        let err = registry.require("ffmpeg").unwrap_err();
        assert!(matches!(err, hf_core::Error::Tool { ref tool, .. } if tool == "ffmpeg"));
    }

    #[test]
    fn missing_configured_path_falls_back_to_path_search() {
        let cfg = ToolsConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
        };
        let registry = ToolRegistry::discover(&cfg);
        if let Ok(ffmpeg) = registry.require("ffmpeg") {
            assert_ne!(ffmpeg.path, PathBuf::from("/nonexistent/ffmpeg"));
        }
    }

    #[test]
    fn configured_path_wins_when_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ffmpeg");
        std::fs::write(&fake, b"").unwrap();

        let cfg = ToolsConfig {
            ffmpeg_path: Some(fake.clone()),
        };
        let registry = ToolRegistry::discover(&cfg);
        assert_eq!(registry.require("ffmpeg").unwrap().path, fake);
    }

    #[tokio::test]
    async fn unavailable_tool_reported() {
        let infos = ToolRegistry::default().check_all().await;
        let ffmpeg = infos.iter().find(|i| i.name == "ffmpeg").unwrap();
        assert!(!ffmpeg.available);
        assert!(ffmpeg.version.is_none());
        assert!(ffmpeg.path.is_none());
    }

    #[test]
    fn tool_info_serialization() {
        let info = ToolInfo {
            name: "ffmpeg".to_string(),
            available: true,
            version: Some("ffmpeg version 7.0".into()),
            path: Some(PathBuf::from("/usr/bin/ffmpeg")),
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"available\":true"));
        let back: ToolInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "ffmpeg");
    }
}
