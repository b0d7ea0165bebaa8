//! # hf-av
//!
//! Everything that touches the external transcoder.
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the ffmpeg path.
//! - **Command execution** ([`ToolCommand`]) -- async builder that either runs
//!   a tool to completion or spawns it as a long-lived child.
//! - **Argument building** ([`build_arguments`]) -- the segment-muxer command
//!   line for one output manifest, assembled from a [`StreamState`].
//! - **Launching** ([`TranscodeLauncher`], [`FfmpegLauncher`]) -- start and stop
//!   background segmenting jobs.
//! - **Cleanup** ([`cleanup_partial`]) -- best-effort removal of the files a
//!   superseded or abandoned job left behind.

pub mod cleanup;
pub mod command;
pub mod launcher;
pub mod tools;
pub mod transcode;

// ---- Re-exports for convenience ----

pub use cleanup::{cleanup_partial, cleanup_partial_with, CleanupFailure, CleanupReport};
pub use command::{ToolCommand, ToolOutput};
pub use launcher::{FfmpegLauncher, TranscodeLauncher};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use transcode::{build_arguments, StreamState, TranscodeArguments};
