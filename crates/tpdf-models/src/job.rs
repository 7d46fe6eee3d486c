//! Job identity, status and record types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stage::Stage;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet picked up by a worker
    #[default]
    Pending,
    /// A pipeline stage is running (or retrying)
    Processing,
    /// Final PDF artifact exists in the cache
    Completed,
    /// A collaborator failed terminally; `message` holds the detail
    Error,
    /// Intermediates reclaimed, final artifact reference retained
    Archived,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Archived => "archived",
        }
    }

    /// Terminal states receive no further worker updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error | JobStatus::Archived)
    }

    /// Whether a final result payload may be served for this status.
    pub fn has_result(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Archived)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The job record persisted under `job_<id>`.
///
/// Updates are read-modify-write merges: an update against an unknown id
/// merges over an empty base rather than failing, and the API layer decides
/// whether that amounts to "not found".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job ID
    pub id: JobId,
    /// Lifecycle status
    pub status: JobStatus,
    /// Stage currently (or last) executing; `None` before the first stage
    #[serde(default)]
    pub current_step: Option<Stage>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Error detail; non-empty whenever `status` is `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// User-assigned label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl JobRecord {
    /// Create a fresh pending record.
    pub fn new(id: JobId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            current_step: None,
            created_at: now,
            updated_at: now,
            message: None,
            name: None,
        }
    }
}

/// Stage outputs assembled for a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Recognized text
    pub ocr: Option<String>,
    /// Translated text
    pub translate: Option<String>,
    /// Path to the rendered PDF artifact
    pub pdf: Option<String>,
}

/// The contracted job-result shape served to polling clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResultView {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(rename = "currentStep")]
    pub current_step: Option<Stage>,
    /// `None` until the job completes
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_pending_with_no_step() {
        let record = JobRecord::new(JobId::new());
        assert_eq!(record.status, JobStatus::Pending);
        assert!(record.current_step.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Archived.is_terminal());
        assert!(JobStatus::Archived.has_result());
        assert!(!JobStatus::Error.has_result());
    }

    #[test]
    fn result_view_serializes_contracted_shape() {
        let view = JobResultView {
            id: JobId::from_string("j1"),
            status: JobStatus::Completed,
            current_step: Some(Stage::Pdf),
            result: Some(JobResult {
                ocr: Some("hello".into()),
                translate: Some("xin chao".into()),
                pdf: Some("/output/output_j1.pdf".into()),
            }),
            message: None,
        };

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["currentStep"], "pdf");
        assert_eq!(value["result"]["translate"], "xin chao");
        assert!(value.get("message").is_none());
    }
}
