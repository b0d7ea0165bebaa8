//! Media-domain enums for segment containers.
//!
//! Serialized in lowercase (via `serde(rename_all = "lowercase")`) with a
//! manual `Display` for consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// ---------------------------------------------------------------------------
// SegmentContainer
// ---------------------------------------------------------------------------

/// Container written for each HLS segment.
///
/// This is the closed set of extensions the playlist rewriter understands.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SegmentContainer {
    /// MPEG transport stream (video + audio).
    #[default]
    Ts,
    /// Raw ADTS AAC (audio only).
    Aac,
    /// MPEG-1 Layer III (audio only).
    Mp3,
}

impl SegmentContainer {
    /// Every supported container, in a stable order.
    pub const ALL: [SegmentContainer; 3] = [Self::Ts, Self::Aac, Self::Mp3];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ts => "ts",
            Self::Aac => "aac",
            Self::Mp3 => "mp3",
        }
    }

    /// Muxer name passed to ffmpeg's `-segment_format`.
    pub fn muxer(self) -> &'static str {
        match self {
            Self::Ts => "mpegts",
            Self::Aac => "adts",
            Self::Mp3 => "mp3",
        }
    }

    /// Whether segments of this container carry a video stream.
    pub fn has_video(self) -> bool {
        matches!(self, Self::Ts)
    }

    /// Look up a container by extension (case-insensitive, optional leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|c| c.extension().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for SegmentContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for SegmentContainer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
            .ok_or_else(|| Error::Validation(format!("unsupported segment container: {s}")))
    }
}
