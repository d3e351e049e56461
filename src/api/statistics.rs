//! Dashboard statistics endpoint.

use axum::extract::State;

use super::{success, ApiResult};
use crate::models::Statistics;
use crate::AppState;

/// GET /api/statistics - Counters derived from current records.
pub async fn get_statistics(State(state): State<AppState>) -> ApiResult<Statistics> {
    success(state.repo.statistics().await?)
}
