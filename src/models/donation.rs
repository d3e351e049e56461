//! Donation model.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DonationType {
    Goods,
    Money,
}

impl DonationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationType::Goods => "goods",
            DonationType::Money => "money",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "goods" => Some(DonationType::Goods),
            "money" => Some(DonationType::Money),
            _ => None,
        }
    }
}

/// Handling stage of a donation. Only ever moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Verified,
    Distributed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Verified => "verified",
            DonationStatus::Distributed => "distributed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DonationStatus::Pending),
            "verified" => Some(DonationStatus::Verified),
            "distributed" => Some(DonationStatus::Distributed),
            _ => None,
        }
    }

    /// Check a transition. `Ok(false)` means the status is unchanged.
    pub fn check_transition(&self, next: DonationStatus) -> Result<bool, AppError> {
        if next < *self {
            return Err(AppError::InvalidState(format!(
                "Donation status cannot move from {} back to {}",
                self.as_str(),
                next.as_str()
            )));
        }
        Ok(next != *self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: String,
    #[serde(rename = "type")]
    pub donation_type: DonationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub description: String,
    pub donor_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    pub created_at: String,
    pub status: DonationStatus,
}

/// Request body for recording a donation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateDonationRequest {
    #[serde(rename = "type")]
    pub donation_type: String,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub donor_name: String,
    pub mission_id: Option<String>,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDonation {
    pub donation_type: DonationType,
    pub amount: Option<f64>,
    pub description: String,
    pub donor_name: String,
    pub mission_id: Option<String>,
    pub receipt_url: Option<String>,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl CreateDonationRequest {
    pub fn validate(&self) -> Result<NewDonation, AppError> {
        let donation_type = DonationType::parse(self.donation_type.trim()).ok_or_else(|| {
            AppError::Validation(format!("Invalid donation type: {:?}", self.donation_type))
        })?;

        let donor_name = self.donor_name.trim();
        if donor_name.is_empty() {
            return Err(AppError::Validation("Donor name is required".to_string()));
        }

        if let Some(amount) = self.amount {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(AppError::Validation(
                    "Amount must be greater than zero".to_string(),
                ));
            }
        }

        let description = trimmed(&self.description);
        match donation_type {
            DonationType::Money if self.amount.is_none() => {
                return Err(AppError::Validation(
                    "Amount is required for money donations".to_string(),
                ));
            }
            DonationType::Goods if description.is_none() => {
                return Err(AppError::Validation(
                    "Description of the donated goods is required".to_string(),
                ));
            }
            _ => {}
        }

        Ok(NewDonation {
            donation_type,
            amount: self.amount,
            description: description.unwrap_or_default(),
            donor_name: donor_name.to_string(),
            mission_id: trimmed(&self.mission_id),
            receipt_url: trimmed(&self.receipt_url),
        })
    }
}

/// Request body for advancing a donation.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDonationStatusRequest {
    pub status: String,
}

/// Query parameters for listing donations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationQuery {
    pub mission_id: Option<String>,
}
