//! Invidious API client
//!
//! Search provider for Invidious-compatible JSON APIs
//! (`/api/v1/search`, `/api/v1/videos/{id}`).

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tunely_common::human_time::format_timestamp;

use crate::services::search_provider::{ProviderError, RawResult, SearchProvider};

const USER_AGENT: &str = concat!("tunely/", env!("CARGO_PKG_VERSION"));

/// Preferred thumbnail quality
const PREFERRED_THUMBNAIL_QUALITY: &str = "medium";

/// Search result item (videos, channels and playlists share this endpoint)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InvidiousItem {
    #[serde(rename = "type")]
    item_type: String,
    title: Option<String>,
    video_id: String,
    author: Option<String>,
    length_seconds: Option<u64>,
    view_count: Option<u64>,
    video_thumbnails: Vec<InvidiousThumbnail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct InvidiousThumbnail {
    quality: String,
    url: String,
}

/// Invidious API client
pub struct InvidiousClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl InvidiousClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Network(e.to_string())
        }
    }

    fn to_raw(&self, item: InvidiousItem) -> RawResult {
        let thumbnail = item
            .video_thumbnails
            .iter()
            .find(|t| t.quality == PREFERRED_THUMBNAIL_QUALITY)
            .or_else(|| item.video_thumbnails.first())
            .map(|t| absolute_url(&self.base_url, &t.url))
            .filter(|u| !u.is_empty());

        RawResult {
            id: item.video_id,
            title: item.title,
            author: item.author,
            timestamp: item.length_seconds.map(format_timestamp),
            thumbnail,
            views: item.view_count,
        }
    }
}

#[async_trait]
impl SearchProvider for InvidiousClient {
    fn name(&self) -> &'static str {
        "invidious"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawResult>, ProviderError> {
        let url = format!("{}/api/v1/search", self.base_url);

        tracing::debug!(url = %url, query = %query, "Querying Invidious search");

        let response = self
            .http_client
            .get(&url)
            .query(&[("q", query), ("type", "video")])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status(status.as_u16(), error_text));
        }

        let items: Vec<InvidiousItem> = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let results: Vec<RawResult> = items
            .into_iter()
            .filter(|item| item.item_type == "video" && !item.video_id.is_empty())
            .take(limit)
            .map(|item| self.to_raw(item))
            .collect();

        tracing::debug!(results = results.len(), "Invidious search complete");
        Ok(results)
    }

    async fn lookup(&self, id: &str) -> Result<Option<RawResult>, ProviderError> {
        let url = format!("{}/api/v1/videos/{}", self.base_url, id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status(status.as_u16(), error_text));
        }

        let mut item: InvidiousItem = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if item.video_id.is_empty() {
            item.video_id = id.to_string();
        }

        Ok(Some(self.to_raw(item)))
    }
}

/// Some instances return thumbnail paths relative to the instance root
fn absolute_url(base_url: &str, url: &str) -> String {
    if url.starts_with('/') && !url.starts_with("//") {
        format!("{}{}", base_url, url)
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        url.to_string()
    }
}
