//! Search orchestration: upstream call, relevance filter, normalization
//!
//! Stateless across invocations; every call is one upstream round-trip.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use tunely_common::api::types::Track;

use crate::services::normalizer::TrackNormalizer;
use crate::services::relevance_filter::RelevancePolicy;
use crate::services::search_provider::SearchProvider;
use crate::services::stream_session::validate_track_id;

/// Search path errors
#[derive(Debug, Error)]
pub enum SearchError {
    /// Empty or whitespace-only query
    #[error("Query parameter is required")]
    InvalidQuery,

    /// Upstream provider failed (network, timeout, malformed response)
    #[error("Upstream search unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid track id: {0}")]
    InvalidTrackId(String),

    #[error("Track not found: {0}")]
    TrackNotFound(String),
}

/// Search service
pub struct SearchService {
    provider: Arc<dyn SearchProvider>,
    policy: RelevancePolicy,
    normalizer: TrackNormalizer,
}

impl SearchService {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        policy: RelevancePolicy,
        normalizer: TrackNormalizer,
    ) -> Self {
        Self {
            provider,
            policy,
            normalizer,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Search upstream and return canonical tracks in relevance order.
    ///
    /// An empty result is a valid outcome, distinct from an error.
    pub async fn search(&self, query: &str) -> Result<Vec<Track>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery);
        }

        info!(query = %query, provider = self.provider.name(), "Searching");

        let mut candidates = self
            .provider
            .search(query, self.policy.candidate_limit)
            .await
            .map_err(|e| {
                warn!(query = %query, error = %e, "Upstream search failed");
                SearchError::UpstreamUnavailable(e.to_string())
            })?;

        // Upstream ordering is the base relevance signal
        candidates.truncate(self.policy.candidate_limit);

        let selected = self.policy.filter(&candidates, query);
        let tracks: Vec<Track> = selected
            .into_iter()
            .take(self.policy.result_limit)
            .map(|raw| self.normalizer.normalize(raw))
            .collect();

        info!(
            query = %query,
            candidates = candidates.len(),
            results = tracks.len(),
            "Search complete"
        );
        Ok(tracks)
    }

    /// Metadata-only lookup for a single track id
    pub async fn lookup(&self, id: &str) -> Result<Track, SearchError> {
        validate_track_id(id).map_err(|_| SearchError::InvalidTrackId(id.to_string()))?;

        debug!(track_id = %id, provider = self.provider.name(), "Looking up track");

        let raw = self.provider.lookup(id).await.map_err(|e| {
            warn!(track_id = %id, error = %e, "Upstream lookup failed");
            SearchError::UpstreamUnavailable(e.to_string())
        })?;

        match raw {
            Some(raw) if !raw.id.is_empty() => Ok(self.normalizer.normalize(&raw)),
            _ => Err(SearchError::TrackNotFound(id.to_string())),
        }
    }
}
