//! Job polling, preview, download and archival.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::{Extension, Json};
use serde::Serialize;
use tracing::info;

use chrono::{DateTime, Utc};

use tpdf_models::{JobId, JobResultView, JobStatus, Stage};
use tpdf_registry::keys;

use crate::error::{ApiError, ApiResult};
use crate::session::SessionId;
use crate::state::AppState;

/// Resolve the path parameter and enforce session ownership.
async fn owned_job(state: &AppState, session_id: &str, job_id: String) -> ApiResult<JobId> {
    let job_id = JobId::from_string(job_id);
    if !state.sessions.owns_job(session_id, &job_id).await {
        return Err(ApiError::forbidden("job does not belong to this session"));
    }
    Ok(job_id)
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub id: String,
    pub status: JobStatus,
    #[serde(rename = "currentStep")]
    pub current_step: Option<Stage>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /api/job/:job_id
///
/// The polling endpoint: the job's last known status snapshot, cheap
/// enough to hit every second.
pub async fn get_job(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job_id = owned_job(&state, &session_id, job_id).await?;

    let record = state
        .jobs
        .get_job(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    Ok(Json(JobStatusResponse {
        id: record.id.to_string(),
        status: record.status,
        current_step: record.current_step,
        updated_at: record.updated_at,
        message: record.message,
    }))
}

/// GET /api/job/:job_id/result
///
/// The contracted result shape, with `result` null until the render stage
/// has set the completion flag.
pub async fn get_job_result(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobResultView>> {
    let job_id = owned_job(&state, &session_id, job_id).await?;

    let view = state
        .jobs
        .get_job_result(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    Ok(Json(view))
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub ocr: Option<String>,
    pub translate: Option<String>,
    #[serde(rename = "imagePath")]
    pub image_path: Option<String>,
}

/// GET /api/preview/:job_id
///
/// Partial results while the pipeline is still running.
pub async fn preview_job(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<PreviewResponse>> {
    let job_id = owned_job(&state, &session_id, job_id).await?;

    if state.jobs.get_job(&job_id).await?.is_none() {
        return Err(ApiError::not_found("job not found"));
    }

    let ocr = state.cache.get(&keys::job_stage(&job_id, Stage::Ocr)).await;
    let translate = state.cache.get(&keys::job_stage(&job_id, Stage::Translate)).await;
    let image_path = state.cache.get(&keys::job_preprocessed(&job_id)).await;

    Ok(Json(PreviewResponse {
        ocr,
        translate,
        image_path,
    }))
}

/// GET /api/download/:job_id
///
/// Streams the rendered PDF artifact.
pub async fn download_job(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Path(job_id): Path<String>,
) -> ApiResult<(HeaderMap, Vec<u8>)> {
    let job_id = owned_job(&state, &session_id, job_id).await?;

    let view = state
        .jobs
        .get_job_result(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    let pdf_path = view
        .result
        .and_then(|r| r.pdf)
        .ok_or_else(|| ApiError::not_found("result not ready"))?;

    let bytes = tokio::fs::read(&pdf_path)
        .await
        .map_err(|e| ApiError::internal(format!("failed to read artifact: {}", e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    let disposition = format!("attachment; filename=\"output_{}.pdf\"", job_id);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((headers, bytes))
}

#[derive(Debug, Serialize)]
pub struct ArchiveResponse {
    pub success: bool,
}

/// POST /api/job/:job_id/archive
///
/// Drops a completed job's intermediate artifacts, keeping the final PDF
/// reference.
pub async fn archive_job(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ArchiveResponse>> {
    let job_id = owned_job(&state, &session_id, job_id).await?;

    let success = state.jobs.archive_job(&job_id).await?;
    if success {
        info!(job_id = %job_id, "archived via API");
    }
    Ok(Json(ArchiveResponse { success }))
}
