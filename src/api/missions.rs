//! Relief mission API endpoints.

use axum::extract::{Path, State};

use super::{created, success, ApiResult, AppJson, AppQuery};
use crate::auth::{mission_key, AttemptOutcome, DeviceId};
use crate::errors::AppError;
use crate::models::{
    parse_category_filter, AdminAccess, AdminGrant, AdminRequest, CreateMissionRequest,
    CreatedMission, MapMarker, MapQuery, MissionFilterQuery, MissionPriority, MissionView,
    PriorityRequest,
};
use crate::AppState;

/// GET /api/missions - List missions, newest first.
pub async fn list_missions(
    State(state): State<AppState>,
    device: Option<DeviceId>,
    AppQuery(query): AppQuery<MissionFilterQuery>,
) -> ApiResult<Vec<MissionView>> {
    let filter = query.parse()?;
    let missions = state.repo.list_missions().await?;

    success(
        missions
            .iter()
            .filter(|m| filter.matches(m))
            .map(|m| m.view(device.as_ref()))
            .collect(),
    )
}

/// GET /api/missions/map - Markers for missions that have coordinates.
pub async fn mission_map(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<MapQuery>,
) -> ApiResult<Vec<MapMarker>> {
    let category = parse_category_filter(&query.category)?;
    let missions = state.repo.list_missions().await?;

    success(
        missions
            .iter()
            .filter(|m| category.map_or(true, |c| m.category == c))
            .filter_map(|m| m.marker())
            .collect(),
    )
}

/// GET /api/missions/{id} - Get a single mission.
pub async fn get_mission(
    State(state): State<AppState>,
    device: Option<DeviceId>,
    Path(id): Path<String>,
) -> ApiResult<MissionView> {
    match state.repo.get_mission(&id).await? {
        Some(mission) => success(mission.view(device.as_ref())),
        None => Err(AppError::NotFound(format!("Mission {} not found", id))),
    }
}

/// POST /api/missions - Create a mission owned by the calling device.
pub async fn create_mission(
    State(state): State<AppState>,
    device: Option<DeviceId>,
    AppJson(request): AppJson<CreateMissionRequest>,
) -> ApiResult<CreatedMission> {
    let new = request.validate()?;
    let device = device.ok_or_else(|| {
        AppError::Validation("A device id is required to create a mission".to_string())
    })?;

    let mission = state.repo.create_mission(&new, &device).await?;

    if let Err(e) = state.search.index_mission(&mission).await {
        tracing::warn!("Failed to index mission: {}", e);
    }

    tracing::info!(
        mission_id = %mission.id,
        category = mission.category.as_str(),
        status = mission.status.as_str(),
        people_needed = mission.people_needed,
        "Mission created"
    );

    created(CreatedMission {
        mission: mission.view(Some(&device)),
        organizer_pin: mission.organizer_pin.clone(),
    })
}

/// POST /api/missions/{id}/join - Volunteer for a mission.
pub async fn join_mission(
    State(state): State<AppState>,
    device: DeviceId,
    Path(id): Path<String>,
) -> ApiResult<MissionView> {
    let (mission, joined) = state.repo.join_mission(&id, &device).await?;

    if joined {
        tracing::info!(
            mission_id = %mission.id,
            volunteers = mission.current_volunteers(),
            "Volunteer joined mission"
        );
    }

    success(mission.view(Some(&device)))
}

/// POST /api/missions/{id}/admin - Check admin rights before using the panel.
pub async fn unlock_admin(
    State(state): State<AppState>,
    device: Option<DeviceId>,
    Path(id): Path<String>,
    AppJson(request): AppJson<AdminRequest>,
) -> ApiResult<AdminAccess> {
    let pin = request.pin.as_deref();
    let gate = PinGate::enter(&state, &id, device.as_ref()).await?;
    let result = state.repo.authorize_admin(&id, device.as_ref(), pin).await;
    let (_, via) = gate.settle(&state, pin, result).await?;

    success(AdminAccess {
        authorized: true,
        via,
    })
}

/// POST /api/missions/{id}/complete - Mark a mission completed.
pub async fn complete_mission(
    State(state): State<AppState>,
    device: Option<DeviceId>,
    Path(id): Path<String>,
    AppJson(request): AppJson<AdminRequest>,
) -> ApiResult<MissionView> {
    let pin = request.pin.as_deref();
    let gate = PinGate::enter(&state, &id, device.as_ref()).await?;
    let result = state.repo.complete_mission(&id, device.as_ref(), pin).await;
    let (mission, via) = gate.settle(&state, pin, result).await?;

    if let Err(e) = state.search.index_mission(&mission).await {
        tracing::warn!("Failed to re-index mission: {}", e);
    }

    tracing::info!(
        mission_id = %mission.id,
        via = ?via,
        volunteers = mission.current_volunteers(),
        "Mission completed"
    );

    success(mission.view(device.as_ref()))
}

/// PUT /api/missions/{id}/priority - Switch between active and urgent.
pub async fn set_mission_priority(
    State(state): State<AppState>,
    device: Option<DeviceId>,
    Path(id): Path<String>,
    AppJson(request): AppJson<PriorityRequest>,
) -> ApiResult<MissionView> {
    let priority = MissionPriority::parse(request.priority.trim()).ok_or_else(|| {
        AppError::Validation(format!("Invalid priority: {:?}", request.priority))
    })?;

    let pin = request.pin.as_deref();
    let gate = PinGate::enter(&state, &id, device.as_ref()).await?;
    let result = state
        .repo
        .set_mission_priority(&id, device.as_ref(), pin, priority)
        .await;
    let (mission, via) = gate.settle(&state, pin, result).await?;

    tracing::info!(
        mission_id = %mission.id,
        status = mission.status.as_str(),
        via = ?via,
        "Mission priority changed"
    );

    success(mission.view(device.as_ref()))
}

/// Failed-PIN throttling around an admin action on one mission.
///
/// Entering reserves an attempt slot, so concurrent wrong PINs cannot
/// overrun the limit. The organizer device bypasses the gate entirely.
struct PinGate {
    key: Option<String>,
}

impl PinGate {
    async fn enter(
        state: &AppState,
        mission_id: &str,
        device: Option<&DeviceId>,
    ) -> Result<Self, AppError> {
        let mission = state
            .repo
            .get_mission(mission_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Mission {} not found", mission_id)))?;

        if device.is_some_and(|d| mission.is_organizer(d)) {
            return Ok(Self { key: None });
        }

        let key = mission_key(mission_id);
        state.throttle.begin_attempt(&key).await?;
        Ok(Self { key: Some(key) })
    }

    async fn settle<T>(
        self,
        state: &AppState,
        pin: Option<&str>,
        result: Result<(T, AdminGrant), AppError>,
    ) -> Result<(T, AdminGrant), AppError> {
        let Some(key) = self.key else {
            return result;
        };

        let outcome = match &result {
            Ok((_, AdminGrant::Pin)) => AttemptOutcome::Accepted,
            Err(AppError::Unauthorized(_)) if pin.is_some() => AttemptOutcome::Rejected,
            _ => AttemptOutcome::Skipped,
        };
        state.throttle.finish_attempt(&key, outcome).await;
        result
    }
}
