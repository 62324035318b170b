//! Shared API request/response types

use serde::{Deserialize, Serialize};

/// Display value used when upstream omits an artist or title
pub const UNKNOWN: &str = "Unknown";

// ========================================
// Track
// ========================================

/// Canonical search/stream record exposed to clients
///
/// Built once per search response and never mutated afterwards. Clients hold
/// Track state across requests (favorites, history); the server keeps none.
///
/// # Examples
///
/// ```
/// use tunely_common::api::types::Track;
///
/// let track = Track {
///     id: "dQw4w9WgXcQ".to_string(),
///     title: "Never Gonna Give You Up".to_string(),
///     artist: "Rick Astley".to_string(),
///     duration_seconds: 213,
///     thumbnail_url: "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg".to_string(),
///     stream_url: "http://localhost:3000/stream/dQw4w9WgXcQ".to_string(),
///     view_count: 0,
/// };
/// let json = serde_json::to_value(&track).unwrap();
/// assert_eq!(json["durationSeconds"], 213);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Opaque upstream identifier; the join key between search and stream
    pub id: String,

    pub title: String,

    /// Channel/author name, "Unknown" when upstream omits it
    pub artist: String,

    /// Length in whole seconds, 0 when unknown
    pub duration_seconds: u64,

    /// Absolute thumbnail URL
    pub thumbnail_url: String,

    /// Absolute URL of this service's stream endpoint for `id`
    pub stream_url: String,

    /// Upstream view count, 0 when unknown
    pub view_count: u64,
}

// ========================================
// Error Response Types
// ========================================

/// JSON error body returned by every endpoint
///
/// ```
/// use tunely_common::api::types::ErrorResponse;
///
/// let body = serde_json::to_string(&ErrorResponse::new("Query parameter is required")).unwrap();
/// assert_eq!(body, r#"{"error":"Query parameter is required"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
