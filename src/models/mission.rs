//! Relief mission model and its lifecycle rules.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::auth::{constant_time_compare, DeviceId};
use crate::errors::AppError;

/// Lifecycle status of a mission. `Completed` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Active,
    Urgent,
    Completed,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Active => "active",
            MissionStatus::Urgent => "urgent",
            MissionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(MissionStatus::Active),
            "urgent" => Some(MissionStatus::Urgent),
            "completed" => Some(MissionStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionStatus::Completed)
    }
}

/// The status an admin may pick for a mission that is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionPriority {
    Active,
    Urgent,
}

impl MissionPriority {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(MissionPriority::Active),
            "urgent" => Some(MissionPriority::Urgent),
            _ => None,
        }
    }

    pub fn status(&self) -> MissionStatus {
        match self {
            MissionPriority::Active => MissionStatus::Active,
            MissionPriority::Urgent => MissionStatus::Urgent,
        }
    }
}

/// Kind of relief a mission provides.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MissionCategory {
    Food,
    Medical,
    Shelter,
    Rescue,
    Supplies,
}

impl MissionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionCategory::Food => "food",
            MissionCategory::Medical => "medical",
            MissionCategory::Shelter => "shelter",
            MissionCategory::Rescue => "rescue",
            MissionCategory::Supplies => "supplies",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "food" => Some(MissionCategory::Food),
            "medical" => Some(MissionCategory::Medical),
            "shelter" => Some(MissionCategory::Shelter),
            "rescue" => Some(MissionCategory::Rescue),
            "supplies" => Some(MissionCategory::Supplies),
            _ => None,
        }
    }
}

/// A geographic point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// How an admin request was authorized.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AdminGrant {
    /// The caller is the device that created the mission.
    OrganizerDevice,
    /// The caller presented the organizer PIN.
    Pin,
}

/// A relief mission as persisted.
///
/// Holds the organizer secrets, so it is never serialized directly; handlers
/// expose it through [`MissionView`].
#[derive(Debug, Clone)]
pub struct Mission {
    pub id: String,
    pub title: String,
    pub location: String,
    pub description: String,
    pub category: MissionCategory,
    pub status: MissionStatus,
    pub people_needed: u32,
    /// Device ids of joined volunteers
    pub volunteers: BTreeSet<String>,
    pub coordinates: Option<Coordinates>,
    pub image_url: Option<String>,
    pub organizer_device_id: String,
    pub organizer_pin: String,
    pub created_by: String,
    pub created_at: String,
    /// Internal version, bumped on every status change
    pub version: i64,
}

impl Mission {
    pub fn current_volunteers(&self) -> usize {
        self.volunteers.len()
    }

    pub fn is_organizer(&self, device: &DeviceId) -> bool {
        constant_time_compare(device.as_str(), &self.organizer_device_id)
    }

    /// Grant admin rights to the organizer device or to any holder of the PIN.
    pub fn authorize_admin(
        &self,
        device: Option<&DeviceId>,
        pin: Option<&str>,
    ) -> Result<AdminGrant, AppError> {
        if device.is_some_and(|d| self.is_organizer(d)) {
            return Ok(AdminGrant::OrganizerDevice);
        }

        match pin {
            Some(pin) if !pin.is_empty() && constant_time_compare(pin, &self.organizer_pin) => {
                Ok(AdminGrant::Pin)
            }
            Some(_) => Err(AppError::Unauthorized("Incorrect PIN".to_string())),
            None => Err(AppError::Unauthorized(
                "Organizer PIN is required to manage this mission".to_string(),
            )),
        }
    }

    /// Fail if the mission no longer accepts changes.
    pub fn ensure_mutable(&self) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Mission {} is already completed",
                self.id
            )));
        }
        Ok(())
    }

    /// Public representation relative to the viewing device.
    pub fn view(&self, viewer: Option<&DeviceId>) -> MissionView {
        MissionView {
            id: self.id.clone(),
            title: self.title.clone(),
            location: self.location.clone(),
            description: self.description.clone(),
            category: self.category,
            status: self.status,
            people_needed: self.people_needed,
            current_volunteers: self.current_volunteers(),
            coordinates: self.coordinates,
            image_url: self.image_url.clone(),
            created_by: self.created_by.clone(),
            created_at: self.created_at.clone(),
            has_joined: viewer.is_some_and(|d| self.volunteers.contains(d.as_str())),
            is_organizer: viewer.is_some_and(|d| self.is_organizer(d)),
        }
    }

    /// Map marker, if the mission has coordinates.
    pub fn marker(&self) -> Option<MapMarker> {
        let coordinates = self.coordinates?;
        Some(MapMarker {
            id: self.id.clone(),
            title: self.title.clone(),
            category: self.category,
            status: self.status,
            lat: coordinates.lat,
            lng: coordinates.lng,
            current_volunteers: self.current_volunteers(),
            people_needed: self.people_needed,
        })
    }
}

/// Mission as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionView {
    pub id: String,
    pub title: String,
    pub location: String,
    pub description: String,
    pub category: MissionCategory,
    pub status: MissionStatus,
    pub people_needed: u32,
    pub current_volunteers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub has_joined: bool,
    pub is_organizer: bool,
}

/// Creation response: the only place the organizer PIN is ever returned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMission {
    #[serde(flatten)]
    pub mission: MissionView,
    pub organizer_pin: String,
}

/// A mission pinned on the map.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub id: String,
    pub title: String,
    pub category: MissionCategory,
    pub status: MissionStatus,
    pub lat: f64,
    pub lng: f64,
    pub current_volunteers: usize,
    pub people_needed: u32,
}

/// Request body for creating a mission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateMissionRequest {
    pub title: String,
    pub location: String,
    pub description: String,
    pub category: String,
    pub people_needed: i64,
    /// `active` (default) or `urgent`
    pub priority: Option<String>,
    pub organizer_name: String,
    pub coordinates: Option<Coordinates>,
    pub image_url: Option<String>,
}

/// A creation request that passed validation.
#[derive(Debug, Clone)]
pub struct NewMission {
    pub title: String,
    pub location: String,
    pub description: String,
    pub category: MissionCategory,
    pub people_needed: u32,
    pub status: MissionStatus,
    pub created_by: String,
    pub coordinates: Option<Coordinates>,
    pub image_url: Option<String>,
}

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

impl CreateMissionRequest {
    pub fn validate(&self) -> Result<NewMission, AppError> {
        let title = required(&self.title, "Title")?;
        let location = required(&self.location, "Location")?;
        let description = required(&self.description, "Description")?;
        let created_by = required(&self.organizer_name, "Organizer name")?;

        let category = MissionCategory::parse(self.category.trim()).ok_or_else(|| {
            AppError::Validation(format!("Invalid category: {:?}", self.category))
        })?;

        if self.people_needed < 1 {
            return Err(AppError::Validation(
                "peopleNeeded must be at least 1".to_string(),
            ));
        }
        let people_needed = u32::try_from(self.people_needed)
            .map_err(|_| AppError::Validation("peopleNeeded is too large".to_string()))?;

        let status = match self.priority.as_deref().map(str::trim) {
            None | Some("") => MissionStatus::Active,
            Some(p) => MissionPriority::parse(p)
                .map(|p| p.status())
                .ok_or_else(|| AppError::Validation(format!("Invalid priority: {:?}", p)))?,
        };

        if let Some(coordinates) = &self.coordinates {
            if !coordinates.is_valid() {
                return Err(AppError::Validation("Invalid coordinates".to_string()));
            }
        }

        let image_url = self
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Ok(NewMission {
            title,
            location,
            description,
            category,
            people_needed,
            status,
            created_by,
            coordinates: self.coordinates,
            image_url,
        })
    }
}

/// Body for admin actions that may be authorized by PIN.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminRequest {
    pub pin: Option<String>,
}

/// Body for switching a running mission between active and urgent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriorityRequest {
    pub priority: String,
    pub pin: Option<String>,
}

/// Admin unlock response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAccess {
    pub authorized: bool,
    pub via: AdminGrant,
}

/// Query parameters for listing missions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MissionFilterQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
}

/// Parsed list filter. `all` or an empty value means no restriction.
#[derive(Debug, Clone, Default)]
pub struct MissionFilter {
    pub query: Option<String>,
    pub status: Option<MissionStatus>,
    pub category: Option<MissionCategory>,
}

fn selected(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "all")
}

pub fn parse_category_filter(value: &Option<String>) -> Result<Option<MissionCategory>, AppError> {
    selected(value)
        .map(|c| {
            MissionCategory::parse(c)
                .ok_or_else(|| AppError::Validation(format!("Invalid category: {:?}", c)))
        })
        .transpose()
}

impl MissionFilterQuery {
    pub fn parse(&self) -> Result<MissionFilter, AppError> {
        let status = selected(&self.status)
            .map(|s| {
                MissionStatus::parse(s)
                    .ok_or_else(|| AppError::Validation(format!("Invalid status: {:?}", s)))
            })
            .transpose()?;

        Ok(MissionFilter {
            query: selected(&self.q).map(str::to_lowercase),
            status,
            category: parse_category_filter(&self.category)?,
        })
    }
}

impl MissionFilter {
    /// Case-insensitive substring match on title, location and description,
    /// combined with the status and category selections.
    pub fn matches(&self, mission: &Mission) -> bool {
        let matches_query = self.query.as_deref().map_or(true, |q| {
            mission.title.to_lowercase().contains(q)
                || mission.location.to_lowercase().contains(q)
                || mission.description.to_lowercase().contains(q)
        });

        matches_query
            && self.status.map_or(true, |s| mission.status == s)
            && self.category.map_or(true, |c| mission.category == c)
    }
}

/// Query parameters for the map view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapQuery {
    pub category: Option<String>,
}

/// Mission fixture shared by tests across modules.
#[cfg(test)]
pub(crate) fn sample_mission() -> Mission {
    Mission {
        id: "m-1".to_string(),
        title: "Emergency Food Distribution".to_string(),
        location: "San Roque, Quezon City".to_string(),
        description: "Packing and handing out relief goods".to_string(),
        category: MissionCategory::Food,
        status: MissionStatus::Active,
        people_needed: 15,
        volunteers: BTreeSet::new(),
        coordinates: Some(Coordinates {
            lat: 14.6507,
            lng: 121.0495,
        }),
        image_url: None,
        organizer_device_id: "device_organizer".to_string(),
        organizer_pin: "4821".to_string(),
        created_by: "Maria".to_string(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        version: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str) -> DeviceId {
        DeviceId::parse(id).unwrap()
    }

    fn valid_request() -> CreateMissionRequest {
        CreateMissionRequest {
            title: "Emergency Food Distribution".to_string(),
            location: "San Roque".to_string(),
            description: "Relief goods".to_string(),
            category: "food".to_string(),
            people_needed: 15,
            priority: Some("urgent".to_string()),
            organizer_name: "Maria".to_string(),
            coordinates: None,
            image_url: None,
        }
    }

    #[test]
    fn test_organizer_device_is_authorized() {
        let mission = sample_mission();
        let grant = mission
            .authorize_admin(Some(&device("device_organizer")), None)
            .unwrap();
        assert_eq!(grant, AdminGrant::OrganizerDevice);
    }

    #[test]
    fn test_pin_holder_is_authorized() {
        let mission = sample_mission();
        let grant = mission
            .authorize_admin(Some(&device("device_other")), Some("4821"))
            .unwrap();
        assert_eq!(grant, AdminGrant::Pin);

        // A device is not needed when the PIN is presented
        assert_eq!(
            mission.authorize_admin(None, Some("4821")).unwrap(),
            AdminGrant::Pin
        );
    }

    #[test]
    fn test_other_inputs_are_rejected() {
        let mission = sample_mission();
        let other = device("device_other");

        for pin in [None, Some(""), Some("1234"), Some("48210"), Some("482")] {
            let err = mission.authorize_admin(Some(&other), pin).unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)), "pin {:?}", pin);
        }
        assert!(mission.authorize_admin(None, None).is_err());
    }

    #[test]
    fn test_completed_mission_is_immutable() {
        let mut mission = sample_mission();
        assert!(mission.ensure_mutable().is_ok());
        mission.status = MissionStatus::Completed;
        assert!(matches!(
            mission.ensure_mutable(),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_view_hides_secrets_and_derives_count() {
        let mut mission = sample_mission();
        mission.volunteers.insert("device_a".to_string());
        mission.volunteers.insert("device_b".to_string());

        let view = mission.view(Some(&device("device_a")));
        assert_eq!(view.current_volunteers, 2);
        assert!(view.has_joined);
        assert!(!view.is_organizer);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("organizerPin").is_none());
        assert!(json.get("organizerDeviceId").is_none());
        assert!(json.get("volunteers").is_none());
        assert_eq!(json["currentVolunteers"], 2);
        assert_eq!(json["category"], "food");
    }

    #[test]
    fn test_marker_requires_coordinates() {
        let mut mission = sample_mission();
        assert!(mission.marker().is_some());
        mission.coordinates = None;
        assert!(mission.marker().is_none());
    }

    #[test]
    fn test_validate_accepts_complete_request() {
        let new = valid_request().validate().unwrap();
        assert_eq!(new.status, MissionStatus::Urgent);
        assert_eq!(new.category, MissionCategory::Food);
        assert_eq!(new.people_needed, 15);
    }

    #[test]
    fn test_validate_defaults_to_active() {
        let mut request = valid_request();
        request.priority = None;
        assert_eq!(request.validate().unwrap().status, MissionStatus::Active);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let cases: Vec<Box<dyn Fn(&mut CreateMissionRequest)>> = vec![
            Box::new(|r| r.title = "   ".to_string()),
            Box::new(|r| r.location.clear()),
            Box::new(|r| r.description.clear()),
            Box::new(|r| r.organizer_name.clear()),
            Box::new(|r| r.category = "weather".to_string()),
            Box::new(|r| r.people_needed = 0),
            Box::new(|r| r.people_needed = -3),
            Box::new(|r| r.priority = Some("completed".to_string())),
            Box::new(|r| {
                r.coordinates = Some(Coordinates {
                    lat: 91.0,
                    lng: 0.0,
                })
            }),
        ];

        for mutate in cases {
            let mut request = valid_request();
            mutate(&mut request);
            assert!(matches!(
                request.validate(),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_filter_matches() {
        let mission = sample_mission();

        let filter = MissionFilterQuery {
            q: Some("QUEZON".to_string()),
            status: Some("all".to_string()),
            category: Some("food".to_string()),
        }
        .parse()
        .unwrap();
        assert!(filter.matches(&mission));

        let filter = MissionFilterQuery {
            q: None,
            status: Some("urgent".to_string()),
            category: None,
        }
        .parse()
        .unwrap();
        assert!(!filter.matches(&mission));

        assert!(MissionFilterQuery {
            status: Some("archived".to_string()),
            ..Default::default()
        }
        .parse()
        .is_err());
    }
}
