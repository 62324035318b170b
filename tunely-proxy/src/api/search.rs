//! Search and track info endpoints

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use tunely_common::api::types::Track;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query parameters for `/search`
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Free-text query; missing is treated like empty
    #[serde(default)]
    pub q: String,
}

/// GET /search?q=<query>
///
/// Returns the re-ranked, normalized tracks for a query. An empty array is
/// a valid answer. Undecodable query strings get the JSON error body too.
pub async fn search_tracks(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Track>>> {
    let Query(query) = query?;
    let tracks = state.search.search(&query.q).await?;
    Ok(Json(tracks))
}

/// GET /info/:id
///
/// Metadata for one track without streaming it.
pub async fn get_track_info(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Track>> {
    let Path(id) = id?;
    let track = state.search.lookup(&id).await.map_err(ApiError::Lookup)?;
    Ok(Json(track))
}
