//! The immutable description of a playlist request.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::media::SegmentContainer;
use crate::{Error, Result};

/// What a client asked for: which media item, where to start, and how the
/// segments should be encoded.
///
/// Owned by the caller; the streaming core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Library-relative path of the source media.
    pub item: String,
    /// Seek position into the source.
    #[serde(default)]
    pub start: Duration,
    /// Segment container.
    #[serde(default)]
    pub container: SegmentContainer,
    /// Requested video codec (`copy` when absent).
    #[serde(default)]
    pub video_codec: Option<String>,
    /// Requested audio codec (container default when absent).
    #[serde(default)]
    pub audio_codec: Option<String>,
}

impl StreamRequest {
    /// Create a request for `item` starting at the beginning, segmented as TS.
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            start: Duration::ZERO,
            container: SegmentContainer::default(),
            video_codec: None,
            audio_codec: None,
        }
    }

    /// Set the seek position.
    pub fn with_start(mut self, start: Duration) -> Self {
        self.start = start;
        self
    }

    /// Set the segment container.
    pub fn with_container(mut self, container: SegmentContainer) -> Self {
        self.container = container;
        self
    }

    /// Return the item as a relative path that cannot escape the library root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty, absolute, or `..`-bearing items.
    pub fn relative_item_path(&self) -> Result<PathBuf> {
        let trimmed = self.item.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("item is required".into()));
        }

        let path = Path::new(trimmed);
        let mut relative = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(Error::Validation(format!(
                        "item must be a library-relative path: {trimmed}"
                    )))
                }
            }
        }

        if relative.as_os_str().is_empty() {
            return Err(Error::Validation("item is required".into()));
        }
        Ok(relative)
    }
}
