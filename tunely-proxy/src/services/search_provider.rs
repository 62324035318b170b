//! Upstream search provider abstraction
//!
//! A provider turns a free-text query into upstream-shaped [`RawResult`]
//! records. Providers report whatever fields the upstream happens to carry;
//! all defaulting happens later in the normalizer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ExtractorConfig, SearchConfig, SearchProviderKind};
use crate::services::invidious_client::InvidiousClient;
use crate::services::ytdlp_search::YtDlpSearchProvider;

/// Upstream-shaped search record prior to normalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResult {
    /// Upstream identifier (providers drop records without one)
    pub id: String,
    pub title: Option<String>,
    /// Channel or uploader name
    pub author: Option<String>,
    /// Clock-style duration ("3:45")
    pub timestamp: Option<String>,
    pub thumbnail: Option<String>,
    pub views: Option<u64>,
}

impl RawResult {
    /// Create a record carrying only an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_views(mut self, views: u64) -> Self {
        self.views = Some(views);
        self
    }
}

/// Upstream provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Upstream error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Search tool ran but reported failure
    #[error("Search tool failed: {0}")]
    Tool(String),

    /// Search tool binary could not be started
    #[error("Search tool not found: {0}")]
    ToolNotFound(String),
}

/// Source of raw search candidates
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short provider name for logs and health output
    fn name(&self) -> &'static str;

    /// Search upstream, returning at most `limit` candidates in upstream order
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawResult>, ProviderError>;

    /// Fetch metadata for a single identifier; `Ok(None)` when upstream has no such item
    async fn lookup(&self, id: &str) -> Result<Option<RawResult>, ProviderError>;
}

/// Build the configured provider
pub fn build_provider(
    search: &SearchConfig,
    extractor: &ExtractorConfig,
) -> Result<Arc<dyn SearchProvider>, ProviderError> {
    let provider: Arc<dyn SearchProvider> = match search.provider {
        SearchProviderKind::Ytdlp => Arc::new(YtDlpSearchProvider::new(
            extractor.clone(),
            search.timeout(),
        )),
        SearchProviderKind::Invidious => Arc::new(InvidiousClient::new(
            &search.invidious_base_url,
            search.timeout(),
        )?),
    };

    tracing::info!(provider = provider.name(), "Search provider initialized");
    Ok(provider)
}
