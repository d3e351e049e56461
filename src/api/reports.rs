//! Emergency report endpoints.

use axum::extract::State;

use super::{created, success, ApiResult, AppJson};
use crate::models::{Incident, ReportReceipt, ReportRequest};
use crate::AppState;

/// POST /api/report - Submit an emergency report.
pub async fn submit_report(
    State(state): State<AppState>,
    AppJson(request): AppJson<ReportRequest>,
) -> ApiResult<ReportReceipt> {
    let new = request.validate()?;
    let incident = state.repo.create_incident(&new).await?;

    tracing::info!(
        incident_id = %incident.id,
        emergency_type = incident.emergency_type.as_deref().unwrap_or("unspecified"),
        "Emergency report received"
    );

    created(ReportReceipt {
        message: "Emergency report received successfully!".to_string(),
        id: incident.id,
    })
}

/// GET /api/reports - List reports for dispatchers, newest first.
pub async fn list_reports(State(state): State<AppState>) -> ApiResult<Vec<Incident>> {
    success(state.repo.list_incidents().await?)
}
