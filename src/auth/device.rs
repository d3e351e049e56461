//! Device identity extraction.
//!
//! Browsers keep a random id in local storage and send it in the
//! `x-device-id` header. It identifies an actor weakly and is never trusted
//! beyond that: anything security-relevant also accepts a PIN.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};

use crate::errors::AppError;

/// Header carrying the caller's device identity.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

const MAX_DEVICE_ID_LEN: usize = 128;

/// Client-supplied device identity for the current request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate a raw header value.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Device id is required".to_string()));
        }
        if trimmed.len() > MAX_DEVICE_ID_LEN {
            return Err(AppError::Validation(format!(
                "Device id must be at most {} characters",
                MAX_DEVICE_ID_LEN
            )));
        }
        if !trimmed.chars().all(|c| c.is_ascii_graphic()) {
            return Err(AppError::Validation(
                "Device id contains invalid characters".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn header_value(parts: &Parts) -> Result<Option<&str>, AppError> {
    match parts.headers.get(DEVICE_ID_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| AppError::Validation("Device id contains invalid characters".to_string())),
    }
}

impl<S: Send + Sync> FromRequestParts<S> for DeviceId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match header_value(parts)? {
            Some(raw) => DeviceId::parse(raw),
            None => Err(AppError::Validation(format!(
                "Missing {} header",
                DEVICE_ID_HEADER
            ))),
        }
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for DeviceId {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        header_value(parts)?.map(DeviceId::parse).transpose()
    }
}
