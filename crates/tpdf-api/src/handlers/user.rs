//! Session history, job renaming and user settings.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tpdf_models::JobId;

use crate::error::{ApiError, ApiResult};
use crate::session::SessionId;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// GET /api/user/history
pub async fn get_history(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let entries = state.sessions.get_session_jobs(&session_id).await;

    let mut history = Vec::with_capacity(entries.len());
    for entry in entries {
        let status = state
            .jobs
            .get_job(&entry.job_id)
            .await?
            .map(|record| record.status.to_string());
        history.push(HistoryEntry {
            job_id: entry.job_id.to_string(),
            created_at: entry.created_at,
            name: entry.name,
            status,
        });
    }

    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RenameResponse {
    pub success: bool,
}

/// POST /api/user/rename/:job_id
///
/// Ownership failure is a boolean `false`, not an error status.
pub async fn rename_job(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Path(job_id): Path<String>,
    Json(body): Json<RenameRequest>,
) -> ApiResult<Json<RenameResponse>> {
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }

    let job_id = JobId::from_string(job_id);
    let success = state
        .sessions
        .rename_job(&session_id, &job_id, body.name.trim())
        .await;

    Ok(Json(RenameResponse { success }))
}

/// GET /api/user/settings
pub async fn get_settings(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> ApiResult<Json<HashMap<String, serde_json::Value>>> {
    Ok(Json(state.sessions.get_settings(&session_id).await))
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub success: bool,
}

/// POST /api/user/settings
///
/// Merges the posted map into the stored settings.
pub async fn save_settings(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Json(settings): Json<HashMap<String, serde_json::Value>>,
) -> ApiResult<Json<SettingsResponse>> {
    let success = state.sessions.save_settings(&session_id, settings).await;
    Ok(Json(SettingsResponse { success }))
}
