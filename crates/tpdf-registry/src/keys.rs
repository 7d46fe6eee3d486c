//! Key layout for job and session state.
//!
//! Everything lives under the cache store's application prefix; these
//! helpers fix the second-level naming so the job manager, the workers and
//! the ledger agree on it.

use tpdf_models::{JobId, Stage};

/// The job record.
pub fn job(id: &JobId) -> String {
    format!("job_{}", id)
}

/// A job-scoped stage output (`job_<id>_ocr`, `job_<id>_translate`, ...).
pub fn job_stage(id: &JobId, stage: Stage) -> String {
    format!("job_{}_{}", id, stage.as_str())
}

/// The preprocessed image path for a job.
pub fn job_preprocessed(id: &JobId) -> String {
    format!("job_{}_preprocessed", id)
}

/// The content hash of a job's uploaded file.
pub fn job_filehash(id: &JobId) -> String {
    format!("job_{}_filehash", id)
}

/// The completion flag set by the render worker.
pub fn job_completed(id: &JobId) -> String {
    format!("job_{}_completed", id)
}

/// The session record.
pub fn session(session_id: &str) -> String {
    format!("session:{}", session_id)
}

/// The set of job ids owned by a session.
pub fn session_jobs(session_id: &str) -> String {
    format!("session:{}:jobs", session_id)
}

/// The ownership hash for a job (`session_id`, `created_at`, `name`).
pub fn job_owner(id: &JobId) -> String {
    format!("job:{}:owner", id)
}
