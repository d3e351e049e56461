//! Community feed endpoints.

use axum::extract::State;

use super::{created, success, ApiResult, AppJson, AppQuery};
use crate::models::{CommunityUpdate, CreateUpdateRequest, UpdateQuery};
use crate::AppState;

/// Maximum number of updates returned at once.
const MAX_UPDATES_LIMIT: usize = 100;

/// GET /api/updates - Latest community updates.
pub async fn list_updates(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UpdateQuery>,
) -> ApiResult<Vec<CommunityUpdate>> {
    let limit = query.limit.min(MAX_UPDATES_LIMIT);
    success(state.repo.list_updates(limit).await?)
}

/// POST /api/updates - Post a community update.
pub async fn create_update(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateUpdateRequest>,
) -> ApiResult<CommunityUpdate> {
    let new = request.validate()?;
    let update = state.repo.create_update(&new).await?;

    tracing::info!(update_id = %update.id, update_type = update.update_type.as_str(), "Community update posted");

    created(update)
}
