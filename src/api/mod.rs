//! REST API module.
//!
//! Contains all API routes and handlers following the frontend contract.
//! Successful responses are the bare JSON resource; failures use the
//! `{message, code}` body produced by [`AppError`].

mod donations;
mod field_missions;
mod missions;
mod reports;
mod search;
mod statistics;
mod updates;

pub use donations::*;
pub use field_missions::*;
pub use missions::*;
pub use reports::*;
pub use search::*;
pub use statistics::*;
pub use updates::*;

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// JSON body extractor whose rejections render as [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Query string extractor whose rejections render as [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Response type for handlers.
pub type ApiResult<T> = Result<(StatusCode, Json<T>), AppError>;

/// 200 with the resource as body.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(data)))
}

/// 201 with the created resource as body.
pub fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(data)))
}
