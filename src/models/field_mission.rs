//! Field missions: response teams dispatched to reported incidents and
//! retrieved by access PIN.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Coordinates;
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldMissionStatus {
    Pending,
    Active,
    Completed,
}

impl FieldMissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldMissionStatus::Pending => "pending",
            FieldMissionStatus::Active => "active",
            FieldMissionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FieldMissionStatus::Pending),
            "active" => Some(FieldMissionStatus::Active),
            "completed" => Some(FieldMissionStatus::Completed),
            _ => None,
        }
    }
}

/// A team dispatch. The `pin` is the lookup key field teams use to fetch it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMission {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_team: Option<String>,
    pub pin: String,
    pub status: FieldMissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub emergency_type: Option<String>,
    pub created_at: String,
}

/// Request body for `POST /api/missions/create`.
///
/// Fields are taken as raw JSON so a wrong type reports the same message as
/// a missing value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchRequest {
    pub incident_id: Option<Value>,
    pub assigned_team: Option<Value>,
}

/// A dispatch request that passed validation.
#[derive(Debug, Clone)]
pub struct NewDispatch {
    pub incident_id: String,
    pub assigned_team: String,
}

fn non_blank(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl DispatchRequest {
    pub fn validate(&self) -> Result<NewDispatch, AppError> {
        // Incident ids arrive either as strings or as numbers
        let incident_id = self.incident_id.as_ref().and_then(|v| match v {
            Value::Number(n) => Some(n.to_string()),
            other => non_blank(other),
        });
        let assigned_team = self.assigned_team.as_ref().and_then(non_blank);

        match (incident_id, assigned_team) {
            (Some(incident_id), Some(assigned_team)) => Ok(NewDispatch {
                incident_id,
                assigned_team,
            }),
            _ => Err(AppError::Validation(
                "Missing mission details (incidentId or assignedTeam)".to_string(),
            )),
        }
    }
}

/// Request body for `POST /api/missions/access`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccessRequest {
    pub pin: Option<Value>,
}

impl AccessRequest {
    /// The PIN exactly as supplied. Absence, `null` and `""` are rejected.
    ///
    /// `Ok(None)` means a PIN of another JSON type, which matches no mission.
    pub fn pin(&self) -> Result<Option<&str>, AppError> {
        match &self.pin {
            None | Some(Value::Null) => Err(pin_required()),
            Some(Value::String(pin)) if pin.is_empty() => Err(pin_required()),
            Some(Value::String(pin)) => Ok(Some(pin.as_str())),
            Some(_) => Ok(None),
        }
    }
}

fn pin_required() -> AppError {
    AppError::Validation("PIN is required".to_string())
}
