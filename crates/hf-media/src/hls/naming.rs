//! Physical and logical segment names.
//!
//! Physical: `<SEGMENT_PREFIX><stem><NNN>.<ext>` next to the manifest.
//! Logical: `<LOGICAL_ROOT>/<stem>/stream.<ext>`. Every segment of one job
//! collapses onto the same logical name.
//!
//! Stems must end in a non-digit, otherwise the stem and the segment index
//! cannot be told apart.

use std::path::{Path, PathBuf};

use hf_core::SegmentContainer;

/// Prefix ffmpeg writes in front of every physical segment file.
pub const SEGMENT_PREFIX: &str = "segment-";

/// Directory clients see in place of [`SEGMENT_PREFIX`].
pub const LOGICAL_ROOT: &str = "segments";

/// File stem of every logical segment name.
pub const LOGICAL_STREAM_NAME: &str = "stream";

/// Output file stem, or an empty string for paths without one.
pub fn output_stem(output_path: &Path) -> String {
    output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `segment-<stem>` for the given output manifest.
pub fn segment_base_name(output_path: &Path) -> String {
    format!("{SEGMENT_PREFIX}{}", output_stem(output_path))
}

/// ffmpeg output pattern for the segments of `output_path`:
/// `<dir>/segment-<stem>%03d.<ext>`.
pub fn segment_pattern(output_path: &Path, container: SegmentContainer) -> PathBuf {
    let file_name = format!(
        "{}%03d.{}",
        segment_base_name(output_path),
        container.extension()
    );
    match output_path.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Fixed logical file name for a container, e.g. `stream.ts`.
pub fn logical_file_name(container: SegmentContainer) -> String {
    format!("{LOGICAL_STREAM_NAME}.{}", container.extension())
}

/// Logical reference for every segment of `base`: `segments/<base>/stream.<ext>`.
pub fn logical_segment_path(base: &str, container: SegmentContainer) -> String {
    format!("{LOGICAL_ROOT}/{base}/{}", logical_file_name(container))
}

/// Physical name of segment `index`, as ffmpeg expands [`segment_pattern`].
pub fn physical_segment_name(base: &str, index: u32, container: SegmentContainer) -> String {
    format!("{SEGMENT_PREFIX}{base}{index:03}.{}", container.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_prefixes_stem() {
        assert_eq!(
            segment_base_name(Path::new("/tmp/x/show.m3u8")),
            "segment-show"
        );
    }

    #[test]
    fn pattern_lives_next_to_manifest() {
        let pattern = segment_pattern(Path::new("/tmp/x/show.m3u8"), SegmentContainer::Ts);
        assert_eq!(pattern, PathBuf::from("/tmp/x/segment-show%03d.ts"));

        let pattern = segment_pattern(Path::new("show.m3u8"), SegmentContainer::Mp3);
        assert_eq!(pattern, PathBuf::from("segment-show%03d.mp3"));
    }

    #[test]
    fn physical_names_are_zero_padded() {
        assert_eq!(
            physical_segment_name("show", 1, SegmentContainer::Ts),
            "segment-show001.ts"
        );
        assert_eq!(
            physical_segment_name("show", 1234, SegmentContainer::Aac),
            "segment-show1234.aac"
        );
    }

    #[test]
    fn logical_paths_per_container() {
        assert_eq!(
            logical_segment_path("show", SegmentContainer::Ts),
            "segments/show/stream.ts"
        );
        assert_eq!(
            logical_segment_path("show", SegmentContainer::Aac),
            "segments/show/stream.aac"
        );
        assert_eq!(
            logical_segment_path("show", SegmentContainer::Mp3),
            "segments/show/stream.mp3"
        );
    }

    #[test]
    fn stem_of_path_without_file_is_empty() {
        assert_eq!(output_stem(Path::new("/")), "");
    }
}
