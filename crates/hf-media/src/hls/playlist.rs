//! Physical-to-logical manifest rewriting.

use std::fmt;
use std::path::{Path, MAIN_SEPARATOR};
use std::sync::LazyLock;

use hf_core::SegmentContainer;
use regex::{Captures, Regex};
use serde::Serialize;

use super::naming::{logical_segment_path, SEGMENT_PREFIX};
use super::END_MARKER;

/// Tag the playlist type is injected in front of.
pub const ALLOW_CACHE_TAG: &str = "#EXT-X-ALLOW-CACHE";

/// Tag carrying the injected playlist type.
pub const PLAYLIST_TYPE_TAG: &str = "#EXT-X-PLAYLIST-TYPE";

/// Matches one physical segment reference per line, along with any directory
/// or URL prefix in front of it. The index is the trailing run of three or
/// more digits, so the base always ends in a non-digit.
static SEGMENT_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    let extensions = SegmentContainer::ALL
        .iter()
        .map(|c| c.extension())
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"(?m)^(?:[^\r\n]*[/\\])?{}(?P<base>[^/\\\r\n]*[^/\\\r\n\d])\d{{3,}}\.(?P<ext>{extensions})(?P<cr>\r?)$",
        regex::escape(SEGMENT_PREFIX)
    );
    Regex::new(&pattern).expect("segment reference pattern is valid")
});

/// Finality of a manifest as of the read that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlaylistType {
    /// Still growing; the transcode has not written the end marker.
    Event,
    /// Complete; the end marker is present and the list will not change.
    Vod,
}

impl PlaylistType {
    /// `Vod` if the end marker appears anywhere in `text`, `Event` otherwise.
    pub fn detect(text: &str) -> Self {
        if text.contains(END_MARKER) {
            Self::Vod
        } else {
            Self::Event
        }
    }

    /// Full manifest line, e.g. `#EXT-X-PLAYLIST-TYPE:EVENT`.
    pub fn tag(self) -> String {
        format!("{PLAYLIST_TYPE_TAG}:{self}")
    }
}

impl fmt::Display for PlaylistType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event => write!(f, "EVENT"),
            Self::Vod => write!(f, "VOD"),
        }
    }
}

/// Rewrites a raw segment-list manifest into the form served to clients.
///
/// The transformation is a pure function of `(raw, manifest_dir)`: the same
/// input always yields the same output. It is not idempotent and does not
/// need to be, since every request re-reads the raw file.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaylistTransformer;

impl PlaylistTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite `raw` read from a manifest living in `manifest_dir`.
    ///
    /// 1. Every `<manifest_dir>/` prefix is removed.
    /// 2. `segment-<base><NNN>.<ext>` lines become `segments/<base>/stream.<ext>`,
    ///    dropping whatever directory still precedes the file name (a
    ///    symlinked or differently spelled output directory, for one).
    /// 3. `#EXT-X-PLAYLIST-TYPE:<EVENT|VOD>` is inserted right before the
    ///    `#EXT-X-ALLOW-CACHE` line. Without that line nothing is inserted.
    pub fn transform(&self, raw: &str, manifest_dir: &Path) -> String {
        let relative = strip_directory(raw, manifest_dir);
        let rewritten = rewrite_segment_references(&relative);
        let playlist_type = PlaylistType::detect(&rewritten);
        inject_playlist_type(&rewritten, playlist_type)
    }
}

fn strip_directory(text: &str, dir: &Path) -> String {
    let dir = dir.to_string_lossy();
    let dir = dir.trim_end_matches(['/', MAIN_SEPARATOR]);
    if dir.is_empty() {
        return text.to_string();
    }

    let mut stripped = text.replace(&format!("{dir}/"), "");
    if MAIN_SEPARATOR != '/' {
        stripped = stripped.replace(&format!("{dir}{MAIN_SEPARATOR}"), "");
    }
    stripped
}

fn rewrite_segment_references(text: &str) -> String {
    SEGMENT_REFERENCE
        .replace_all(text, |caps: &Captures| {
            match SegmentContainer::from_extension(&caps["ext"]) {
                Some(container) => format!(
                    "{}{}",
                    logical_segment_path(&caps["base"], container),
                    &caps["cr"]
                ),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn inject_playlist_type(text: &str, playlist_type: PlaylistType) -> String {
    let Some(at) = line_offset(text, ALLOW_CACHE_TAG) else {
        tracing::debug!("Manifest has no {ALLOW_CACHE_TAG} line; playlist type not injected");
        return text.to_string();
    };

    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let tag = playlist_type.tag();

    let mut out = String::with_capacity(text.len() + tag.len() + newline.len());
    out.push_str(&text[..at]);
    out.push_str(&tag);
    out.push_str(newline);
    out.push_str(&text[at..]);
    out
}

/// Byte offset of the first line starting with `prefix`.
fn line_offset(text: &str, prefix: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.starts_with(prefix) {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}
