//! HTTP API handlers for tunely-proxy

pub mod buildinfo;
pub mod health;
pub mod search;
pub mod stream;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use search::{get_track_info, search_tracks};
pub use stream::{stream_routes, stream_track};
