//! Maps upstream-shaped records into canonical [`Track`]s
//!
//! This is the single place where upstream optional fields get their
//! defaults. Everything after normalization works on fully-specified Tracks.

use tunely_common::api::types::{Track, UNKNOWN};
use tunely_common::human_time::parse_timestamp;

use crate::services::search_provider::RawResult;

/// Default thumbnail location when upstream omits one
pub const DEFAULT_THUMBNAIL_TEMPLATE: &str = "https://i.ytimg.com/vi/{id}/mqdefault.jpg";

/// Placeholder replaced by the track id in URL templates
pub const ID_PLACEHOLDER: &str = "{id}";

/// Builds Tracks for one deployment (base URL and thumbnail fallback)
#[derive(Debug, Clone)]
pub struct TrackNormalizer {
    public_base_url: String,
    thumbnail_template: String,
}

impl TrackNormalizer {
    /// `public_base_url` is the externally reachable root of this service,
    /// e.g. `http://localhost:3000`
    pub fn new(public_base_url: impl Into<String>, thumbnail_template: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            public_base_url,
            thumbnail_template: thumbnail_template.into(),
        }
    }

    /// Stream endpoint URL for a track id
    pub fn stream_url(&self, id: &str) -> String {
        format!("{}/stream/{}", self.public_base_url, id)
    }

    /// Thumbnail used when upstream provides none
    pub fn fallback_thumbnail(&self, id: &str) -> String {
        self.thumbnail_template.replace(ID_PLACEHOLDER, id)
    }

    pub fn normalize(&self, raw: &RawResult) -> Track {
        Track {
            id: raw.id.clone(),
            title: non_blank(raw.title.as_deref()).unwrap_or(UNKNOWN).to_string(),
            artist: non_blank(raw.author.as_deref()).unwrap_or(UNKNOWN).to_string(),
            duration_seconds: parse_timestamp(raw.timestamp.as_deref()),
            thumbnail_url: non_blank(raw.thumbnail.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| self.fallback_thumbnail(&raw.id)),
            stream_url: self.stream_url(&raw.id),
            view_count: raw.views.unwrap_or(0),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
