//! Encoding decisions for one playlist request.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use hf_av::StreamState;
use hf_core::{Error, Result, SegmentContainer, StreamRequest};
use sha2::{Digest, Sha256};

use crate::jobs::JobKind;

/// Video encoders a client may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    Copy,
    H264,
}

impl VideoCodec {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::H264 => "h264",
        }
    }
}

impl FromStr for VideoCodec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "h264" | "avc" | "libx264" => Ok(Self::H264),
            other => Err(Error::Validation(format!("unsupported video codec: {other}"))),
        }
    }
}

/// Audio encoders a client may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Copy,
    Aac,
    Mp3,
}

impl AudioCodec {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Aac => "aac",
            Self::Mp3 => "mp3",
        }
    }

    fn default_for(container: SegmentContainer) -> Self {
        match container {
            SegmentContainer::Ts | SegmentContainer::Aac => Self::Aac,
            SegmentContainer::Mp3 => Self::Mp3,
        }
    }

    fn fits(self, container: SegmentContainer) -> bool {
        match (self, container) {
            (Self::Copy, _) | (_, SegmentContainer::Ts) => true,
            (Self::Aac, SegmentContainer::Aac) | (Self::Mp3, SegmentContainer::Mp3) => true,
            _ => false,
        }
    }
}

impl FromStr for AudioCodec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "aac" => Ok(Self::Aac),
            "mp3" | "libmp3lame" => Ok(Self::Mp3),
            other => Err(Error::Validation(format!("unsupported audio codec: {other}"))),
        }
    }
}

/// [`StreamState`] built from a validated [`StreamRequest`].
#[derive(Debug, Clone)]
pub struct RequestStreamState {
    request: StreamRequest,
    /// Normalized library-relative item path.
    item: PathBuf,
    input: PathBuf,
    video: Option<VideoCodec>,
    audio: AudioCodec,
}

impl RequestStreamState {
    /// Validate the codec hints of `request` against its container.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for an item path that leaves the library, unknown
    /// codecs, a video codec on an audio-only container, or an audio codec
    /// the container cannot hold.
    pub fn new(request: StreamRequest, input: PathBuf) -> Result<Self> {
        let item = request.relative_item_path()?;
        let container = request.container;

        let video: Option<VideoCodec> = match (&request.video_codec, container.has_video()) {
            (None, true) => Some(VideoCodec::Copy),
            (Some(codec), true) => Some(codec.parse()?),
            (None, false) => None,
            (Some(codec), false) => {
                return Err(Error::Validation(format!(
                    "container {container} cannot carry video codec {codec}"
                )))
            }
        };

        let audio: AudioCodec = match &request.audio_codec {
            Some(codec) => codec.parse()?,
            None => AudioCodec::default_for(container),
        };
        if !audio.fits(container) {
            return Err(Error::Validation(format!(
                "container {container} cannot carry audio codec {audio:?}"
            )));
        }

        Ok(Self {
            request,
            item,
            input,
            video,
            audio,
        })
    }

    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    pub fn kind(&self) -> JobKind {
        JobKind::for_container(self.request.container)
    }

    /// Output manifest for this state under `transcode_dir`.
    ///
    /// The file stem is a digest of the normalized item path, the seek
    /// position in milliseconds, the container and the resolved codecs, so
    /// requests that produce the same ffmpeg arguments share one job. It is
    /// followed by the job kind, so it always ends in a letter and segment
    /// indices stay unambiguous.
    pub fn output_path(&self, transcode_dir: &Path) -> PathBuf {
        let item = self
            .item
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let mut hasher = Sha256::new();
        hasher.update(item.as_bytes());
        hasher.update([0]);
        hasher.update(self.start_millis().to_le_bytes());
        hasher.update(self.request.container.extension().as_bytes());
        hasher.update([0]);
        hasher.update(self.video.map(VideoCodec::as_str).unwrap_or_default().as_bytes());
        hasher.update([0]);
        hasher.update(self.audio.as_str().as_bytes());
        let digest = hex::encode(hasher.finalize());

        let kind = match self.kind() {
            JobKind::Video => "video",
            JobKind::Audio => "audio",
        };
        transcode_dir.join(format!("{}-{kind}.m3u8", &digest[..16]))
    }

    fn start_millis(&self) -> u128 {
        self.request.start.as_millis()
    }
}

impl StreamState for RequestStreamState {
    fn input_path(&self) -> PathBuf {
        self.input.clone()
    }

    fn seek_args(&self) -> Vec<String> {
        let millis = self.start_millis();
        if millis == 0 {
            return Vec::new();
        }
        vec!["-ss".into(), format!("{}.{:03}", millis / 1000, millis % 1000)]
    }

    fn map_args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::with_capacity(4);
        if self.video.is_some() {
            args.extend(["-map".into(), "0:v:0?".into()]);
        }
        args.extend(["-map".into(), "0:a:0?".into()]);
        args
    }

    fn video_codec_args(&self) -> Vec<String> {
        match self.video {
            None => Vec::new(),
            Some(VideoCodec::Copy) => vec!["-c:v".into(), "copy".into()],
            Some(VideoCodec::H264) => [
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-pix_fmt",
                "yuv420p",
            ]
            .map(String::from)
            .to_vec(),
        }
    }

    fn audio_codec_args(&self) -> Vec<String> {
        match self.audio {
            AudioCodec::Copy => vec!["-c:a".into(), "copy".into()],
            AudioCodec::Aac => ["-c:a", "aac", "-ac", "2"].map(String::from).to_vec(),
            AudioCodec::Mp3 => ["-c:a", "libmp3lame", "-ac", "2"].map(String::from).to_vec(),
        }
    }

    fn container(&self) -> SegmentContainer {
        self.request.container
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state(request: StreamRequest) -> Result<RequestStreamState> {
        RequestStreamState::new(request, PathBuf::from("/media/a.mkv"))
    }

    #[test]
    fn video_defaults_to_copy() {
        let s = state(StreamRequest::new("a.mkv")).unwrap();
        assert!(s.seek_args().is_empty());
        assert_eq!(s.map_args(), ["-map", "0:v:0?", "-map", "0:a:0?"]);
        assert_eq!(s.video_codec_args(), ["-c:v", "copy"]);
        assert_eq!(s.audio_codec_args(), ["-c:a", "aac", "-ac", "2"]);
        assert_eq!(s.kind(), JobKind::Video);
    }

    #[test]
    fn seek_uses_fractional_seconds() {
        let s = state(StreamRequest::new("a.mkv").with_start(Duration::from_millis(90_500))).unwrap();
        assert_eq!(s.seek_args(), ["-ss", "90.500"]);
    }

    #[test]
    fn audio_container_maps_audio_only() {
        let s = state(StreamRequest::new("a.mkv").with_container(SegmentContainer::Mp3)).unwrap();
        assert_eq!(s.map_args(), ["-map", "0:a:0?"]);
        assert!(s.video_codec_args().is_empty());
        assert_eq!(s.audio_codec_args(), ["-c:a", "libmp3lame", "-ac", "2"]);
        assert_eq!(s.kind(), JobKind::Audio);
    }

    #[test]
    fn h264_request() {
        let mut req = StreamRequest::new("a.mkv");
        req.video_codec = Some("H264".into());
        let s = state(req).unwrap();
        assert_eq!(s.video_codec_args()[1], "libx264");
    }

    #[test]
    fn invalid_combinations_are_rejected() {
        let mut video_on_audio = StreamRequest::new("a.mkv").with_container(SegmentContainer::Aac);
        video_on_audio.video_codec = Some("h264".into());
        assert!(matches!(state(video_on_audio), Err(Error::Validation(_))));

        let mut mp3_in_aac = StreamRequest::new("a.mkv").with_container(SegmentContainer::Aac);
        mp3_in_aac.audio_codec = Some("mp3".into());
        assert!(matches!(state(mp3_in_aac), Err(Error::Validation(_))));

        let mut unknown = StreamRequest::new("a.mkv");
        unknown.video_codec = Some("vp9".into());
        assert!(matches!(state(unknown), Err(Error::Validation(_))));
    }

    fn output(request: StreamRequest) -> PathBuf {
        state(request).unwrap().output_path(Path::new("/var/cache/hf"))
    }

    fn with_codecs(item: &str, video: Option<&str>, audio: Option<&str>) -> StreamRequest {
        let mut request = StreamRequest::new(item);
        request.video_codec = video.map(String::from);
        request.audio_codec = audio.map(String::from);
        request
    }

    #[test]
    fn output_path_is_stable_and_distinct() {
        let a = output(StreamRequest::new("shows/a.mkv"));
        assert_eq!(a, output(StreamRequest::new("shows/a.mkv")));
        assert_ne!(
            a,
            output(StreamRequest::new("shows/a.mkv").with_start(Duration::from_secs(60)))
        );
        assert_ne!(
            a,
            output(StreamRequest::new("shows/a.mkv").with_container(SegmentContainer::Aac))
        );
        assert_ne!(a, output(StreamRequest::new("shows/b.mkv")));
        assert_ne!(a, output(with_codecs("shows/a.mkv", Some("h264"), None)));
        assert_eq!(a.parent().unwrap(), Path::new("/var/cache/hf"));
    }

    #[test]
    fn equivalent_requests_share_output() {
        let a = output(StreamRequest::new("shows/a.mkv"));
        for item in ["./shows/a.mkv", "shows//a.mkv", " shows/./a.mkv ", "shows/a.mkv/"] {
            assert_eq!(a, output(StreamRequest::new(item)), "item {item:?}");
        }

        assert_eq!(a, output(with_codecs("shows/a.mkv", Some("copy"), Some("aac"))));
        assert_eq!(a, output(with_codecs("shows/a.mkv", Some("COPY"), Some("AAC"))));

        let h264 = output(with_codecs("shows/a.mkv", Some("h264"), None));
        for alias in ["avc", "libx264", "H264"] {
            assert_eq!(h264, output(with_codecs("shows/a.mkv", Some(alias), None)));
        }

        let seek = output(StreamRequest::new("a.mkv").with_start(Duration::from_millis(1500)));
        assert_eq!(
            seek,
            output(StreamRequest::new("a.mkv").with_start(Duration::from_micros(1_500_400)))
        );
    }

    #[test]
    fn sub_millisecond_start_does_not_seek() {
        let s = state(StreamRequest::new("a.mkv").with_start(Duration::from_micros(400))).unwrap();
        assert!(s.seek_args().is_empty());
    }

    #[test]
    fn escaping_item_is_rejected() {
        assert!(matches!(
            state(StreamRequest::new("../a.mkv")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn output_stem_ends_in_kind() {
        let path = output(StreamRequest::new("a.mp3").with_container(SegmentContainer::Mp3));
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.ends_with("-audio.m3u8"), "{name}");
        assert_eq!(name.len(), 16 + "-audio.m3u8".len());
    }
}
