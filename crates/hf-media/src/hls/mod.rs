//! HLS manifest handling.
//!
//! A segmenting transcode writes `<dir>/<stem>.m3u8` plus segments named
//! `segment-<stem><NNN>.<ext>`. This module knows that naming contract, reads
//! the manifest while it is still being appended to, and rewrites it into the
//! logical form served to clients.

pub mod naming;
mod playlist;
mod reader;

pub use playlist::{PlaylistTransformer, PlaylistType, ALLOW_CACHE_TAG, PLAYLIST_TYPE_TAG};
pub use reader::{count_segments, FileSource, ManifestSource, PlaylistReader};

/// Segment duration marker.
pub const SEGMENT_MARKER: &str = "#EXTINF:";

/// End-of-stream marker.
pub const END_MARKER: &str = "#EXT-X-ENDLIST";
