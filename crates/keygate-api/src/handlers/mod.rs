//! HTTP request handlers.

pub mod admin;
pub mod health;
pub mod status;
pub mod token;
pub mod usage;
pub mod user;

use axum::Json;
use axum::extract::Query;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::{ApiResult, invalid_body, invalid_query, validation_failed};
use crate::extractors::PaginationParams;

/// Unwrap a JSON body and run its field validation.
pub(crate) fn validated<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T>
where
    T: DeserializeOwned + Validate,
{
    let Json(body) = payload.map_err(invalid_body)?;
    body.validate().map_err(validation_failed)?;
    Ok(body)
}

pub(crate) fn pagination(
    query: Result<Query<PaginationParams>, QueryRejection>,
) -> ApiResult<PaginationParams> {
    let Query(params) = query.map_err(invalid_query)?;
    Ok(params)
}

/// Treat empty strings in partial updates as "unchanged".
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
