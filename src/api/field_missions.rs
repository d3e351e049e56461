//! Field mission endpoints: access by PIN and team dispatch.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};

use super::{created, success, ApiResult, AppJson};
use crate::auth::{access_key, AttemptOutcome};
use crate::errors::AppError;
use crate::models::{AccessRequest, DispatchRequest, FieldMission};
use crate::AppState;

/// POST /api/missions/access - Fetch a field mission by its access PIN.
///
/// Lookups are throttled per client address. Client-supplied headers such as
/// `x-device-id` play no part in the key.
pub async fn access_mission(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    AppJson(request): AppJson<AccessRequest>,
) -> ApiResult<FieldMission> {
    let pin = request.pin()?;

    let key = access_key(peer.ip());
    state.throttle.begin_attempt(&key).await?;

    let found = match pin {
        Some(pin) => state.repo.find_field_mission_by_pin(pin).await,
        None => Ok(None),
    };

    match found {
        Ok(Some(mission)) => {
            state
                .throttle
                .finish_attempt(&key, AttemptOutcome::Accepted)
                .await;
            tracing::info!(field_mission_id = %mission.id, "Field mission accessed");
            success(mission)
        }
        Ok(None) => {
            state
                .throttle
                .finish_attempt(&key, AttemptOutcome::Rejected)
                .await;
            Err(AppError::Unauthorized("Invalid PIN".to_string()))
        }
        Err(e) => {
            state
                .throttle
                .finish_attempt(&key, AttemptOutcome::Skipped)
                .await;
            Err(e)
        }
    }
}

/// POST /api/missions/create - Dispatch a team to a reported incident.
pub async fn dispatch_field_mission(
    State(state): State<AppState>,
    AppJson(request): AppJson<DispatchRequest>,
) -> ApiResult<FieldMission> {
    let dispatch = request.validate()?;
    let mission = state.repo.create_field_mission(&dispatch).await?;

    tracing::info!(
        field_mission_id = %mission.id,
        incident_id = %dispatch.incident_id,
        team = %dispatch.assigned_team,
        "Field mission dispatched"
    );

    created(mission)
}
