//! Emergency reports submitted from the field.

use serde::{Deserialize, Serialize};

use super::Coordinates;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_type: Option<String>,
    pub created_at: String,
}

impl Incident {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.latitude,
            lng: self.longitude,
        }
    }
}

/// Request body for `POST /api/report`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub emergency_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewIncident {
    pub location: Coordinates,
    pub emergency_type: Option<String>,
}

impl ReportRequest {
    pub fn validate(&self) -> Result<NewIncident, AppError> {
        let (Some(lat), Some(lng)) = (self.latitude, self.longitude) else {
            return Err(AppError::Validation("Missing location data".to_string()));
        };

        let location = Coordinates { lat, lng };
        if !location.is_valid() {
            return Err(AppError::Validation("Invalid location data".to_string()));
        }

        Ok(NewIncident {
            location,
            emergency_type: self
                .emergency_type
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        })
    }
}

/// Confirmation returned once a report is stored.
#[derive(Debug, Clone, Serialize)]
pub struct ReportReceipt {
    pub message: String,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_location() {
        let request = ReportRequest {
            latitude: Some(14.6),
            longitude: None,
            emergency_type: Some("Flood".to_string()),
        };
        assert_eq!(
            request.validate().unwrap_err().message(),
            "Missing location data"
        );
    }

    #[test]
    fn test_zero_is_a_valid_coordinate() {
        let request = ReportRequest {
            latitude: Some(0.0),
            longitude: Some(0.0),
            emergency_type: None,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_out_of_range() {
        let request = ReportRequest {
            latitude: Some(14.6),
            longitude: Some(200.0),
            emergency_type: None,
        };
        assert_eq!(
            request.validate().unwrap_err().message(),
            "Invalid location data"
        );
    }
}
