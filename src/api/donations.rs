//! Donation API endpoints.

use axum::extract::{Path, State};

use super::{created, success, ApiResult, AppJson, AppQuery};
use crate::errors::AppError;
use crate::models::{
    CreateDonationRequest, Donation, DonationQuery, DonationStatus, UpdateDonationStatusRequest,
};
use crate::AppState;

/// GET /api/donations - List donations, optionally for one mission.
pub async fn list_donations(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DonationQuery>,
) -> ApiResult<Vec<Donation>> {
    let mission_id = query
        .mission_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    success(state.repo.list_donations(mission_id).await?)
}

/// POST /api/donations - Record a donation.
pub async fn create_donation(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateDonationRequest>,
) -> ApiResult<Donation> {
    let new = request.validate()?;
    let donation = state.repo.create_donation(&new).await?;

    tracing::info!(
        donation_id = %donation.id,
        donation_type = donation.donation_type.as_str(),
        mission_id = donation.mission_id.as_deref().unwrap_or("general"),
        "Donation recorded"
    );

    created(donation)
}

/// PUT /api/donations/{id}/status - Advance a donation's handling stage.
pub async fn update_donation_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(request): AppJson<UpdateDonationStatusRequest>,
) -> ApiResult<Donation> {
    let status = DonationStatus::parse(request.status.trim()).ok_or_else(|| {
        AppError::Validation(format!("Invalid donation status: {:?}", request.status))
    })?;

    let donation = state.repo.advance_donation(&id, status).await?;
    tracing::info!(donation_id = %donation.id, status = status.as_str(), "Donation status updated");

    success(donation)
}
