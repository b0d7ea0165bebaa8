//! HLS playlist route handler.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use hf_core::{SegmentContainer, StreamRequest};
use serde::Deserialize;

use crate::context::AppContext;
use crate::error::AppError;

/// MIME type of every playlist response.
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Query parameters describing the requested stream.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlaylistParams {
    /// Library-relative path of the source media.
    pub item: String,
    /// Seek position in seconds.
    pub start: Option<f64>,
    /// Segment container (`ts`, `aac` or `mp3`).
    pub container: Option<SegmentContainer>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

impl PlaylistParams {
    fn into_request(self) -> hf_core::Result<StreamRequest> {
        let start = match self.start {
            None => Duration::ZERO,
            Some(secs) if secs.is_finite() && secs >= 0.0 => Duration::from_secs_f64(secs),
            Some(secs) => {
                return Err(hf_core::Error::Validation(format!(
                    "start must be a non-negative number of seconds, got {secs}"
                )))
            }
        };

        let mut request = StreamRequest::new(self.item)
            .with_start(start)
            .with_container(self.container.unwrap_or_default());
        request.video_codec = self.video_codec.filter(|c| !c.trim().is_empty());
        request.audio_codec = self.audio_codec.filter(|c| !c.trim().is_empty());
        Ok(request)
    }
}

/// GET /api/hls/playlist.m3u8
///
/// Starts the segmenting job on first request and blocks until the manifest
/// lists enough segments; later requests read the manifest as it stands.
#[utoipa::path(
    get,
    path = "/api/hls/playlist.m3u8",
    params(PlaylistParams),
    responses(
        (status = 200, description = "Rewritten HLS playlist", content_type = "application/vnd.apple.mpegurl", body = String),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown media item"),
        (status = 502, description = "Transcoder could not be launched"),
        (status = 504, description = "Manifest did not fill in time")
    )
)]
pub async fn playlist(
    State(ctx): State<AppContext>,
    Query(params): Query<PlaylistParams>,
) -> Result<impl IntoResponse, AppError> {
    let request = params.into_request()?;
    let response = ctx.playlists.serve(&request, &ctx.shutdown).await?;

    tracing::debug!(
        item = %request.item,
        playlist_type = %response.playlist_type,
        started = response.started,
        "Serving playlist"
    );

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)],
        response.body,
    ))
}
