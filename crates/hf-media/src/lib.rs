//! hf-media: HLS manifest handling for on-demand segmenting.
//!
//! # Modules
//!
//! - [`hls`] - segment naming contract, the manifest reader that tolerates a
//!   concurrent writer, and the physical-to-logical playlist rewriter

pub mod hls;

// Re-export commonly used items at the crate root.
pub use hls::{
    count_segments, FileSource, ManifestSource, PlaylistReader, PlaylistTransformer,
    PlaylistType,
};
