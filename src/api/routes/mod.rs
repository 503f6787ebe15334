//! API route modules.

pub mod integrations;
pub mod meetings;

use crate::api::error::ApiError;
use axum::http::HeaderMap;

/// Caller identity, taken from the `x-owner-id` header. Authentication
/// itself is an external collaborator; the header stands in for the
/// session it would establish.
pub fn owner_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-owner-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("Missing x-owner-id header"))
}
