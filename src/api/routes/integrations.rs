//! Integration configuration endpoints.
//!
//! - GET    /integrations     - list the caller's integrations
//! - POST   /integrations     - create (settings validated against type)
//! - PUT    /integrations/:id - update settings and/or toggle enabled
//! - DELETE /integrations/:id - remove

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::owner_id;
use crate::db::{Db, IntegrationRecord, IntegrationRepository, IntegrationSettings};

#[derive(Clone)]
pub struct IntegrationState {
    pub db: Db,
}

#[derive(Debug, Deserialize)]
pub struct CreateIntegrationRequest {
    pub r#type: String,
    pub settings: Value,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateIntegrationRequest {
    pub r#type: Option<String>,
    pub settings: Option<Value>,
    pub is_enabled: Option<bool>,
}

pub fn router(state: IntegrationState) -> Router {
    Router::new()
        .route("/integrations", get(list_integrations).post(create_integration))
        .route("/integrations/:id", put(update_integration).delete(delete_integration))
        .with_state(state)
}

fn integration_json(record: &IntegrationRecord) -> ApiResult<Value> {
    Ok(json!({
        "id": record.id,
        "type": record.settings.kind(),
        "settings": record.settings.to_value()?,
        "isEnabled": record.is_enabled,
        "createdAt": record.created_at,
        "updatedAt": record.updated_at,
    }))
}

async fn list_integrations(
    State(state): State<IntegrationState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let owner = owner_id(&headers)?;

    let integrations = state
        .db
        .with(|conn| IntegrationRepository::list_by_owner(conn, &owner))
        .await?;

    let entries = integrations
        .iter()
        .map(integration_json)
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(json!(entries)))
}

async fn create_integration(
    State(state): State<IntegrationState>,
    headers: HeaderMap,
    Json(request): Json<CreateIntegrationRequest>,
) -> ApiResult<Json<Value>> {
    let owner = owner_id(&headers)?;

    let settings = IntegrationSettings::from_parts(&request.r#type, &request.settings)
        .map_err(|e| ApiError::bad_request(format!("Invalid integration data: {}", e)))?;

    let id = state
        .db
        .with(|conn| IntegrationRepository::insert(conn, &owner, &settings, request.is_enabled))
        .await?;

    let integration = state
        .db
        .with(|conn| IntegrationRepository::get(conn, id, &owner))
        .await?
        .ok_or_else(|| ApiError::internal("Integration vanished after insert"))?;

    Ok(Json(integration_json(&integration)?))
}

async fn update_integration(
    State(state): State<IntegrationState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(request): Json<UpdateIntegrationRequest>,
) -> ApiResult<Json<Value>> {
    let owner = owner_id(&headers)?;

    let existing = state
        .db
        .with(|conn| IntegrationRepository::get(conn, id, &owner))
        .await?
        .ok_or_else(|| ApiError::not_found("Integration not found"))?;

    let settings = match &request.settings {
        Some(payload) => {
            let kind = request
                .r#type
                .clone()
                .unwrap_or_else(|| existing.settings.kind().to_string());
            Some(
                IntegrationSettings::from_parts(&kind, payload)
                    .map_err(|e| ApiError::bad_request(format!("Invalid integration data: {}", e)))?,
            )
        }
        None => None,
    };

    let updated = state
        .db
        .with(|conn| {
            IntegrationRepository::update(conn, id, &owner, settings.as_ref(), request.is_enabled)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Integration not found"))?;

    Ok(Json(integration_json(&updated)?))
}

async fn delete_integration(
    State(state): State<IntegrationState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let owner = owner_id(&headers)?;

    let deleted = state
        .db
        .with(|conn| IntegrationRepository::delete(conn, id, &owner))
        .await?;

    if !deleted {
        return Err(ApiError::not_found("Integration not found"));
    }

    Ok(Json(json!({ "message": "Integration deleted successfully" })))
}
