//! Audio streaming endpoint
//!
//! `GET /stream/:id` answers only once the extractor has produced its first
//! chunk, so every failure up to that point is a JSON error response. After
//! that, a failure truncates the body.

use axum::{
    body::Body,
    extract::{rejection::PathRejection, Path, State},
    http::{header, Method},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::info;

use crate::error::ApiResult;
use crate::services::stream_session::validate_track_id;
use crate::AppState;

/// Streams are uncacheable by shared caches but can be replayed briefly
const CACHE_CONTROL: &str = "private, max-age=300";

/// GET|HEAD /stream/:id
///
/// HEAD answers with the framing headers without spawning an extractor.
pub async fn stream_track(
    State(state): State<AppState>,
    method: Method,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = id?;

    if method == Method::HEAD {
        validate_track_id(&id)?;
        let content_type = state.streams.config().default_content_type.clone();
        return Ok(audio_response(content_type, Body::empty()));
    }

    let session = state.streams.open(&id).await?;

    info!(
        session_id = %session.session_id(),
        track_id = %id,
        pid = ?session.pid(),
        content_type = %session.content_type(),
        "Streaming audio"
    );

    let content_type = session.content_type().to_string();
    Ok(audio_response(
        content_type,
        Body::from_stream(session.into_body_stream()),
    ))
}

fn audio_response(content_type: String, body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCEPT_RANGES, "none".to_string()),
            (header::CONTENT_DISPOSITION, "inline".to_string()),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
        ],
        body,
    )
        .into_response()
}

/// Build streaming routes
pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/stream/:id", get(stream_track))
}
