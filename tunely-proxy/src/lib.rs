//! tunely-proxy library interface
//!
//! Music search aggregation and audio streaming proxy. Exposes the router
//! and services for the binary and for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::http::Method;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::services::normalizer::TrackNormalizer;
use crate::services::search_provider::{build_provider, ProviderError};
use crate::services::search_service::SearchService;
use crate::services::stream_session::StreamManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub streams: Arc<StreamManager>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(search: SearchService, streams: StreamManager) -> Self {
        Self {
            search: Arc::new(search),
            streams: Arc::new(streams),
            startup_time: Utc::now(),
        }
    }

    /// Wire up the configured provider, relevance policy and extractor
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ProviderError> {
        let provider = build_provider(&config.search, &config.extractor)?;
        let normalizer = TrackNormalizer::new(
            config.server.public_base_url(),
            config.search.thumbnail_template.clone(),
        );
        let search = SearchService::new(provider, config.relevance.clone(), normalizer);
        let streams = StreamManager::new(config.extractor.clone());

        Ok(Self::new(search, streams))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/search", get(api::search_tracks))
        .route("/info/:id", get(api::get_track_info))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::stream_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
