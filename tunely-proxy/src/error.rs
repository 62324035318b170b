//! HTTP boundary errors
//!
//! Service errors carry raw causes for logs; clients only ever see the
//! stable message chosen here.

use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tunely_common::api::types::ErrorResponse;

use crate::services::search_service::SearchError;
use crate::services::stream_session::StreamError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// `/search` failures
    #[error(transparent)]
    Search(#[from] SearchError),

    /// `/info/<id>` failures
    #[error("Lookup failed: {0}")]
    Lookup(SearchError),

    /// `/stream/<id>` failures before the first byte
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Query string or path segment that could not be decoded
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    /// Status code and client-facing message
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Search(SearchError::InvalidQuery) => {
                (StatusCode::BAD_REQUEST, "Query parameter is required".to_string())
            }
            ApiError::Search(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to search for songs".to_string(),
            ),
            ApiError::Lookup(SearchError::InvalidTrackId(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid track id".to_string())
            }
            ApiError::Lookup(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to get track info".to_string(),
            ),
            ApiError::Stream(StreamError::InvalidTrackId(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid track id".to_string())
            }
            ApiError::Stream(StreamError::ExtractorNotFound(program)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "{} not found. Please install: brew install yt-dlp (Mac) or pip install yt-dlp",
                    program
                ),
            ),
            ApiError::Stream(StreamError::Busy) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Too many active streams, try again shortly".to_string(),
            ),
            ApiError::Stream(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to stream audio".to_string(),
            ),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
