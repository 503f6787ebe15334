//! Meeting API endpoints.
//!
//! - POST   /meetings      - upload intake, spawns the processing pipeline
//! - GET    /meetings      - list (or ?search=) the caller's meetings
//! - GET    /meetings/:id  - polling read for pipeline status
//! - DELETE /meetings/:id  - remove record and on-disk artifact

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::owner_id;
use crate::db::{Db, MeetingRepository, NewMeeting};
use crate::meeting::Pipeline;

const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "mp4", "m4a", "wav"];

/// Shared state for meeting routes.
#[derive(Clone)]
pub struct MeetingState {
    pub db: Db,
    pub pipeline: Arc<Pipeline>,
}

/// Request body for the upload intake. Multipart transport is handled
/// upstream; by the time this endpoint runs, the file has landed at
/// `audio_path`.
#[derive(Debug, Deserialize)]
pub struct CreateMeetingRequest {
    pub title: Option<String>,
    pub date: Option<String>,
    pub duration: Option<String>,
    pub participants: Option<String>,
    pub audio_path: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub search: Option<String>,
}

pub fn router(state: MeetingState) -> Router {
    Router::new()
        .route("/meetings", post(create_meeting).get(list_meetings))
        .route("/meetings/:id", get(get_meeting).delete(delete_meeting))
        .with_state(state)
}

fn validate_audio_path(raw: &str) -> Result<PathBuf, ApiError> {
    let path = PathBuf::from(raw);

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::bad_request(
            "Invalid file type. Only .mp3, .mp4, .m4a, and .wav files are allowed.",
        ));
    }

    if !path.is_file() {
        return Err(ApiError::bad_request(format!(
            "No audio file found at {}",
            path.display()
        )));
    }

    Ok(path)
}

async fn create_meeting(
    State(state): State<MeetingState>,
    headers: HeaderMap,
    Json(request): Json<CreateMeetingRequest>,
) -> ApiResult<Json<Value>> {
    let owner = owner_id(&headers)?;
    let audio_path = validate_audio_path(&request.audio_path)?;

    let date = request
        .date
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    let title = request
        .title
        .unwrap_or_else(|| format!("Meeting {}", chrono::Local::now().format("%Y-%m-%d")));

    let new_meeting = NewMeeting {
        owner_id: owner.clone(),
        title,
        date,
        duration: request.duration,
        participants: request.participants,
        audio_path: audio_path.to_string_lossy().to_string(),
    };

    let meeting_id = state
        .db
        .with(|conn| MeetingRepository::insert(conn, &new_meeting))
        .await?;

    info!("Meeting {} created by {}, spawning pipeline", meeting_id, owner);

    // Detached background task; the response does not wait for it.
    let pipeline = Arc::clone(&state.pipeline);
    let task_owner = owner.clone();
    tokio::spawn(async move {
        pipeline.process(meeting_id, &task_owner, audio_path).await;
    });

    let meeting = state
        .db
        .with(|conn| MeetingRepository::get(conn, meeting_id, &owner))
        .await?
        .ok_or_else(|| ApiError::internal("Meeting vanished after insert"))?;

    Ok(Json(json!(meeting)))
}

async fn list_meetings(
    State(state): State<MeetingState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let owner = owner_id(&headers)?;

    let meetings = state
        .db
        .with(|conn| match query.search.as_deref() {
            Some(text) if !text.is_empty() => MeetingRepository::search(conn, &owner, text),
            _ => MeetingRepository::list_by_owner(conn, &owner),
        })
        .await?;

    Ok(Json(json!(meetings)))
}

async fn get_meeting(
    State(state): State<MeetingState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let owner = owner_id(&headers)?;

    let meeting = state
        .db
        .with(|conn| MeetingRepository::get(conn, id, &owner))
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

    Ok(Json(json!(meeting)))
}

async fn delete_meeting(
    State(state): State<MeetingState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let owner = owner_id(&headers)?;

    let meeting = state
        .db
        .with(|conn| MeetingRepository::get(conn, id, &owner))
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

    if let Some(audio_path) = &meeting.audio_path {
        let path = PathBuf::from(audio_path);
        if path.exists() {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Meeting {}: failed to delete audio artifact: {}", id, e);
            }
        }
    }

    state
        .db
        .with(|conn| MeetingRepository::delete(conn, id, &owner))
        .await?;

    Ok(Json(json!({ "message": "Meeting deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_audio_path_rejects_bad_extension() {
        let err = validate_audio_path("/tmp/notes.txt");
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_audio_path_rejects_missing_file() {
        let err = validate_audio_path("/nonexistent/dir/audio.mp3");
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_audio_path_accepts_existing_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meeting.WAV");
        std::fs::write(&path, b"RIFF").unwrap();

        let validated = validate_audio_path(path.to_str().unwrap()).unwrap();
        assert_eq!(validated, path);
    }
}
