//! Service modules for search and streaming
//!
//! - Search path: provider → relevance filter → normalizer, orchestrated by
//!   [`SearchService`]
//! - Stream path: [`StreamManager`] spawns one extraction subprocess per
//!   client and ties its lifetime to a [`StreamSession`]

pub mod invidious_client;
pub mod normalizer;
pub mod relevance_filter;
pub mod search_provider;
pub mod search_service;
pub mod stream_session;
pub mod ytdlp_search;

pub use invidious_client::InvidiousClient;
pub use normalizer::TrackNormalizer;
pub use relevance_filter::RelevancePolicy;
pub use search_provider::{build_provider, ProviderError, RawResult, SearchProvider};
pub use search_service::{SearchError, SearchService};
pub use stream_session::{validate_track_id, StreamError, StreamManager, StreamSession};
pub use ytdlp_search::YtDlpSearchProvider;
