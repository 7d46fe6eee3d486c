//! Job state management.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use tpdf_cache::{CacheStore, CacheTier};
use tpdf_models::{JobId, JobRecord, JobResult, JobResultView, JobStatus, Stage};

use crate::error::RegistryResult;
use crate::keys;

/// The single writer of job records.
///
/// All operations go through the cache store; a store failure propagates to
/// the caller, which owns the retry-vs-report decision. "Not found" is a
/// `None`, never an error, so the API layer decides what it means.
#[derive(Clone)]
pub struct JobManager {
    cache: Arc<CacheStore>,
}

impl JobManager {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }

    /// Allocate a job id and write the initial pending record.
    pub async fn create_job(&self) -> RegistryResult<JobId> {
        let id = JobId::new();
        let record = JobRecord::new(id.clone());
        self.cache
            .try_set(&keys::job(&id), &record, CacheTier::Long.ttl())
            .await?;
        info!(job_id = %id, "created job");
        Ok(id)
    }

    /// Merge status/step/message into the job record.
    ///
    /// An unknown id merges over a fresh base record rather than failing.
    /// The read-modify-write is not serialized against concurrent updaters;
    /// a retried message racing a stale in-flight one can interleave, which
    /// is harmless for content-derived values but can reorder timestamps.
    pub async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        step: Option<Stage>,
        message: Option<String>,
    ) -> RegistryResult<JobRecord> {
        let key = keys::job(job_id);
        let mut record: JobRecord = self
            .cache
            .try_get(&key)
            .await?
            .unwrap_or_else(|| JobRecord::new(job_id.clone()));

        record.status = status;
        record.updated_at = Utc::now();
        if let Some(step) = step {
            record.current_step = Some(step);
        }
        if let Some(message) = message {
            record.message = Some(message);
        }

        self.cache.try_set(&key, &record, CacheTier::Long.ttl()).await?;
        debug!(job_id = %job_id, status = %status, step = ?record.current_step, "updated job status");
        Ok(record)
    }

    /// Fetch the job record.
    pub async fn get_job(&self, job_id: &JobId) -> RegistryResult<Option<JobRecord>> {
        Ok(self.cache.try_get(&keys::job(job_id)).await?)
    }

    /// Fetch the job's result view.
    ///
    /// Until the render worker has set the completion flag this returns the
    /// status snapshot with a null result; afterwards the three stage
    /// outputs are assembled from their job-scoped keys.
    pub async fn get_job_result(&self, job_id: &JobId) -> RegistryResult<Option<JobResultView>> {
        let Some(record) = self.get_job(job_id).await? else {
            return Ok(None);
        };

        let completed: Option<bool> = self.cache.try_get(&keys::job_completed(job_id)).await?;
        if completed != Some(true) {
            return Ok(Some(JobResultView {
                id: record.id,
                status: record.status,
                current_step: record.current_step,
                result: None,
                message: record.message,
            }));
        }

        let ocr = self.cache.try_get(&keys::job_stage(job_id, Stage::Ocr)).await?;
        let translate = self.cache.try_get(&keys::job_stage(job_id, Stage::Translate)).await?;
        let pdf = self.cache.try_get(&keys::job_stage(job_id, Stage::Pdf)).await?;

        // Archived jobs keep serving their final artifact reference.
        let status = if record.status == JobStatus::Archived {
            JobStatus::Archived
        } else {
            JobStatus::Completed
        };

        Ok(Some(JobResultView {
            id: record.id,
            status,
            current_step: record.current_step,
            result: Some(JobResult { ocr, translate, pdf }),
            message: record.message,
        }))
    }

    /// Reclaim a completed job's intermediate artifacts, keeping the final
    /// PDF reference and the completion flag.
    pub async fn archive_job(&self, job_id: &JobId) -> RegistryResult<bool> {
        let Some(record) = self.get_job(job_id).await? else {
            return Ok(false);
        };
        if !record.status.has_result() {
            return Ok(false);
        }

        self.cache.remove(&keys::job_stage(job_id, Stage::Ocr)).await?;
        self.cache.remove(&keys::job_stage(job_id, Stage::Translate)).await?;
        self.cache.remove(&keys::job_preprocessed(job_id)).await?;
        self.cache.remove(&keys::job_filehash(job_id)).await?;

        self.update_status(job_id, JobStatus::Archived, None, None).await?;
        info!(job_id = %job_id, "archived job");
        Ok(true)
    }
}
