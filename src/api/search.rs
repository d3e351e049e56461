//! Search API endpoints.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::{success, ApiResult, AppQuery};
use crate::auth::DeviceId;
use crate::errors::AppError;
use crate::models::MissionView;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query string.
    pub q: String,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Search result with missions and metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Single search result item.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub mission: MissionView,
    pub score: f32,
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

/// Deepest result offset a client may page to.
const MAX_SEARCH_OFFSET: usize = 10_000;

/// GET /api/search - Ranked full-text search over missions.
pub async fn search_missions(
    State(state): State<AppState>,
    device: Option<DeviceId>,
    AppQuery(params): AppQuery<SearchQuery>,
) -> ApiResult<SearchResponse> {
    if params.limit == 0 {
        return Err(AppError::Validation("limit must be at least 1".to_string()));
    }
    if params.offset > MAX_SEARCH_OFFSET {
        return Err(AppError::Validation(format!(
            "offset must be at most {}",
            MAX_SEARCH_OFFSET
        )));
    }

    let limit = params.limit.min(MAX_SEARCH_LIMIT);
    let hits = state.search.search(&params.q, limit, params.offset)?;

    // The index may briefly trail the database; skip ids it no longer knows
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        if let Some(mission) = state.repo.get_mission(&hit.mission_id).await? {
            results.push(SearchResultItem {
                mission: mission.view(device.as_ref()),
                score: hit.score,
            });
        }
    }

    let total = results.len();

    success(SearchResponse {
        results,
        total,
        limit,
        offset: params.offset,
    })
}
