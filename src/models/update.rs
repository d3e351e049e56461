//! Community updates shown in the feed. Immutable once posted.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Controls presentation only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Announcement,
    Success,
    Urgent,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Announcement => "announcement",
            UpdateType::Success => "success",
            UpdateType::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "announcement" => Some(UpdateType::Announcement),
            "success" => Some(UpdateType::Success),
            "urgent" => Some(UpdateType::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityUpdate {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "type")]
    pub update_type: UpdateType,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUpdateRequest {
    pub title: String,
    pub content: String,
    pub author: String,
    pub image_url: Option<String>,
    #[serde(rename = "type")]
    pub update_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUpdate {
    pub title: String,
    pub content: String,
    pub author: String,
    pub image_url: Option<String>,
    pub update_type: UpdateType,
}

impl CreateUpdateRequest {
    pub fn validate(&self) -> Result<NewUpdate, AppError> {
        let field = |value: &str, name: &str| {
            let v = value.trim();
            if v.is_empty() {
                Err(AppError::Validation(format!("{} is required", name)))
            } else {
                Ok(v.to_string())
            }
        };

        let update_type = match self.update_type.as_deref().map(str::trim) {
            None | Some("") => UpdateType::Announcement,
            Some(t) => UpdateType::parse(t)
                .ok_or_else(|| AppError::Validation(format!("Invalid update type: {:?}", t)))?,
        };

        Ok(NewUpdate {
            title: field(&self.title, "Title")?,
            content: field(&self.content, "Content")?,
            author: field(&self.author, "Author")?,
            image_url: self
                .image_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            update_type,
        })
    }
}

/// Query parameters for the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_announcement() {
        let request = CreateUpdateRequest {
            title: "Water restored".to_string(),
            content: "Barangay 12 has running water again".to_string(),
            author: "LGU".to_string(),
            ..Default::default()
        };
        assert_eq!(
            request.validate().unwrap().update_type,
            UpdateType::Announcement
        );
    }

    #[test]
    fn test_rejects_blank_fields_and_unknown_type() {
        let request = CreateUpdateRequest {
            title: "".to_string(),
            content: "x".to_string(),
            author: "y".to_string(),
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = CreateUpdateRequest {
            title: "t".to_string(),
            content: "x".to_string(),
            author: "y".to_string(),
            update_type: Some("breaking".to_string()),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }
}
