//! Image upload: the pipeline's entry point.

use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use tpdf_models::{PreprocessMessage, StageMessage};

use crate::error::{ApiError, ApiResult};
use crate::session::SessionId;
use crate::state::AppState;

/// One accepted upload.
#[derive(Debug, Serialize)]
pub struct UploadedJob {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub jobs: Vec<UploadedJob>,
}

/// POST /api/process-images
///
/// Accepts one or more image files, creates a job per file and publishes
/// each into the preprocess queue. Files with an unknown signature or over
/// the size cap are rejected before any job exists.
pub async fn process_images(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut jobs = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))?
    {
        let Some(original_name) = field.file_name().map(|n| n.to_string()) else {
            continue;
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload: {}", e)))?;

        if bytes.len() > state.config.max_upload_size {
            return Err(ApiError::bad_request(format!(
                "file '{}' exceeds the {} byte limit",
                original_name, state.config.max_upload_size
            )));
        }

        let Some(ext) = sniff_image(&bytes) else {
            return Err(ApiError::bad_request(format!(
                "file '{}' is not a supported image",
                original_name
            )));
        };

        let stored_path = format!("{}/{}.{}", state.config.upload_dir, Uuid::new_v4(), ext);
        tokio::fs::create_dir_all(&state.config.upload_dir)
            .await
            .map_err(|e| ApiError::internal(format!("failed to create upload dir: {}", e)))?;
        tokio::fs::write(&stored_path, &bytes)
            .await
            .map_err(|e| ApiError::internal(format!("failed to store upload: {}", e)))?;

        let job_id = state.jobs.create_job().await?;

        if !state.sessions.add_job_to_session(&session_id, &job_id).await {
            warn!(session_id, job_id = %job_id, "failed to register job under session");
        }

        state
            .queue
            .publish(StageMessage::Preprocess(PreprocessMessage {
                image_path: stored_path,
                job_id: job_id.clone(),
            }))
            .await?;

        info!(job_id = %job_id, file = original_name, "accepted upload");
        jobs.push(UploadedJob {
            job_id: job_id.to_string(),
            file_name: original_name,
        });
    }

    if jobs.is_empty() {
        return Err(ApiError::bad_request("no image files in request"));
    }

    Ok(Json(UploadResponse { success: true, jobs }))
}

/// Identify a supported image format from its magic bytes, returning the
/// canonical file extension.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(b"\xff\xd8\xff") {
        Some("jpg")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else if bytes.starts_with(b"II*\x00") || bytes.starts_with(b"MM\x00*") {
        Some("tiff")
    } else if bytes.starts_with(b"BM") {
        Some("bmp")
    } else {
        None
    }
}
