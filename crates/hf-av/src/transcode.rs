//! ffmpeg segment-muxer command lines.
//!
//! [`build_arguments`] is pure: it turns a [`StreamState`] and an output
//! manifest path into the argv of the job that writes that manifest and its
//! segments. Nothing here touches the filesystem or spawns anything.

use std::fmt;
use std::path::{Path, PathBuf};

use hf_core::SegmentContainer;
use hf_media::hls::naming::segment_pattern;

/// Target duration of every segment, in seconds.
pub const SEGMENT_TIME_SECS: u32 = 10;

/// Forces a keyframe every five seconds so segment cuts land on one.
pub const FORCE_KEY_FRAMES: &str = "expr:gte(t,n_forced*5)";

/// Per-request encoding decisions made outside this crate.
///
/// Every fragment is inserted into the command line verbatim.
pub trait StreamState: Send + Sync {
    /// Source media file.
    fn input_path(&self) -> PathBuf;

    /// Arguments placed before `-i` (typically `-ss <secs>`).
    fn seek_args(&self) -> Vec<String>;

    /// Stream selection (`-map ...`).
    fn map_args(&self) -> Vec<String>;

    /// Video encoder settings; empty for audio-only output.
    fn video_codec_args(&self) -> Vec<String>;

    /// Audio encoder settings.
    fn audio_codec_args(&self) -> Vec<String>;

    /// Segment container to write.
    fn container(&self) -> SegmentContainer;
}

/// The argv of one segmenting job, without the program name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeArguments {
    args: Vec<String>,
    output_path: PathBuf,
    container: SegmentContainer,
}

impl TranscodeArguments {
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Manifest the job writes.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn container(&self) -> SegmentContainer {
        self.container
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }
}

/// Renders the single command string, quoting arguments that need it.
impl fmt::Display for TranscodeArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if needs_quotes(arg) {
                write!(f, "\"{}\"", arg.replace('"', "\\\""))?;
            } else {
                f.write_str(arg)?;
            }
        }
        Ok(())
    }
}

fn needs_quotes(arg: &str) -> bool {
    arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"')
}

/// Build the segment-muxer argv for `output_path`.
///
/// Segments land next to the manifest as `segment-<stem><NNN>.<ext>`.
pub fn build_arguments(state: &dyn StreamState, output_path: &Path) -> TranscodeArguments {
    let container = state.container();
    let pattern = segment_pattern(output_path, container);

    let mut args: Vec<String> = Vec::with_capacity(32);
    args.extend(state.seek_args());
    args.push("-i".into());
    args.push(state.input_path().to_string_lossy().into_owned());
    args.extend(state.map_args());
    args.extend(state.video_codec_args());
    args.extend(state.audio_codec_args());
    args.extend(["-force_key_frames".into(), FORCE_KEY_FRAMES.into()]);
    args.extend(["-f".into(), "segment".into()]);
    args.extend(["-segment_time".into(), SEGMENT_TIME_SECS.to_string()]);
    args.extend(["-segment_format".into(), container.muxer().into()]);
    args.extend(["-segment_list_type".into(), "m3u8".into()]);
    args.extend(["-segment_list_flags".into(), "+live".into()]);
    args.extend([
        "-segment_list".into(),
        output_path.to_string_lossy().into_owned(),
    ]);
    args.push("-y".into());
    args.push(pattern.to_string_lossy().into_owned());

    TranscodeArguments {
        args,
        output_path: output_path.to_path_buf(),
        container,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedState {
        input: PathBuf,
        seek: Vec<String>,
        container: SegmentContainer,
    }

    impl StreamState for FixedState {
        fn input_path(&self) -> PathBuf {
            self.input.clone()
        }
        fn seek_args(&self) -> Vec<String> {
            self.seek.clone()
        }
        fn map_args(&self) -> Vec<String> {
            vec!["-map".into(), "0:a:0?".into()]
        }
        fn video_codec_args(&self) -> Vec<String> {
            Vec::new()
        }
        fn audio_codec_args(&self) -> Vec<String> {
            vec!["-c:a".into(), "aac".into()]
        }
        fn container(&self) -> SegmentContainer {
            self.container
        }
    }

    fn audio_state() -> FixedState {
        FixedState {
            input: PathBuf::from("/media/My Show/e01.mkv"),
            seek: vec!["-ss".into(), "90".into()],
            container: SegmentContainer::Aac,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let at = args.iter().position(|a| a == flag).unwrap();
        &args[at + 1]
    }

    #[test]
    fn fragments_appear_in_order() {
        let out = build_arguments(&audio_state(), Path::new("/tmp/x/show.m3u8"));
        let args = out.args();

        assert_eq!(&args[..4], ["-ss", "90", "-i", "/media/My Show/e01.mkv"]);
        assert_eq!(&args[4..8], ["-map", "0:a:0?", "-c:a", "aac"]);
        assert_eq!(args.last().unwrap(), "/tmp/x/segment-show%03d.aac");
        assert_eq!(args[args.len() - 2], "-y");
    }

    #[test]
    fn fixed_segmenting_flags() {
        let out = build_arguments(&audio_state(), Path::new("/tmp/x/show.m3u8"));
        let args = out.args();

        assert_eq!(value_after(args, "-force_key_frames"), "expr:gte(t,n_forced*5)");
        assert_eq!(value_after(args, "-f"), "segment");
        assert_eq!(value_after(args, "-segment_time"), "10");
        assert_eq!(value_after(args, "-segment_format"), "adts");
        assert_eq!(value_after(args, "-segment_list_type"), "m3u8");
        assert_eq!(value_after(args, "-segment_list_flags"), "+live");
        assert_eq!(value_after(args, "-segment_list"), "/tmp/x/show.m3u8");
    }

    #[test]
    fn no_seek_means_input_first() {
        let state = FixedState {
            seek: Vec::new(),
            container: SegmentContainer::Mp3,
            ..audio_state()
        };
        let out = build_arguments(&state, Path::new("/tmp/x/show.m3u8"));
        assert_eq!(out.args()[0], "-i");
        assert_eq!(out.container(), SegmentContainer::Mp3);
        assert_eq!(out.output_path(), Path::new("/tmp/x/show.m3u8"));
        assert_eq!(value_after(out.args(), "-segment_format"), "mp3");
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let out = build_arguments(&audio_state(), Path::new("/tmp/x/show.m3u8"));
        let line = out.to_string();
        assert!(line.starts_with("-ss 90 -i \"/media/My Show/e01.mkv\" -map 0:a:0?"));
        assert!(line.ends_with("-segment_list /tmp/x/show.m3u8 -y /tmp/x/segment-show%03d.aac"));
    }

    #[test]
    fn building_is_pure() {
        let a = build_arguments(&audio_state(), Path::new("/tmp/x/show.m3u8"));
        let b = build_arguments(&audio_state(), Path::new("/tmp/x/show.m3u8"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }
}
