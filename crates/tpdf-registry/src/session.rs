//! Session and job-ownership ledger.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use tpdf_cache::CacheStore;
use tpdf_models::{JobId, Session, SessionJobEntry};

use crate::keys;

/// Sessions and their job sets share one expiration window, refreshed on
/// every access.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Owner of the session records and the exclusive job-ownership mapping.
///
/// Ownership checks report boolean failure, never errors: a rename of a
/// job outside the caller's session is a `false`, and a store hiccup on a
/// read degrades to "no session" rather than a 500 at the API boundary.
#[derive(Clone)]
pub struct SessionLedger {
    cache: Arc<CacheStore>,
}

impl SessionLedger {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }

    /// Create a new session for a user tag.
    pub async fn create_session(&self, user_tag: impl Into<String>) -> Option<String> {
        let session_id = Uuid::new_v4().to_string();
        let session = Session::new(user_tag);

        if self
            .cache
            .set(&keys::session(&session_id), &session, SESSION_TTL)
            .await
        {
            debug!(session_id, "created session");
            Some(session_id)
        } else {
            None
        }
    }

    /// Fetch a session, refreshing its last-activity timestamp and TTL.
    pub async fn get_session(&self, session_id: &str) -> Option<Session> {
        let key = keys::session(session_id);
        let mut session: Session = self.cache.get(&key).await?;
        session.touch();
        self.cache.set(&key, &session, SESSION_TTL).await;
        Some(session)
    }

    /// Register a job under a session.
    ///
    /// Ownership is exclusive: a job already owned by another session is
    /// rejected.
    pub async fn add_job_to_session(&self, session_id: &str, job_id: &JobId) -> bool {
        let result = async {
            let owner = self.cache.hash_get_all(&keys::job_owner(job_id)).await?;
            if let Some(existing) = owner.get("session_id") {
                if existing != session_id {
                    warn!(session_id, job_id = %job_id, "job already owned by another session");
                    return Ok::<bool, tpdf_cache::CacheError>(false);
                }
            }

            self.cache
                .set_add(&keys::session_jobs(session_id), job_id.as_str(), SESSION_TTL)
                .await?;
            self.cache
                .hash_set(
                    &keys::job_owner(job_id),
                    &[
                        ("session_id", session_id.to_string()),
                        ("created_at", Utc::now().timestamp_millis().to_string()),
                    ],
                    SESSION_TTL,
                )
                .await?;
            Ok(true)
        }
        .await;

        match result {
            Ok(added) => {
                if added {
                    debug!(session_id, job_id = %job_id, "added job to session");
                }
                added
            }
            Err(e) => {
                warn!(session_id, job_id = %job_id, "failed to add job to session: {}", e);
                false
            }
        }
    }

    /// List a session's jobs, newest first.
    pub async fn get_session_jobs(&self, session_id: &str) -> Vec<SessionJobEntry> {
        let job_ids = match self.cache.set_members(&keys::session_jobs(session_id)).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(session_id, "failed to list session jobs: {}", e);
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(job_ids.len());
        for id in job_ids {
            let job_id = JobId::from_string(id);
            let owner = match self.cache.hash_get_all(&keys::job_owner(&job_id)).await {
                Ok(owner) => owner,
                Err(_) => continue,
            };
            let Some(created_ms) = owner.get("created_at").and_then(|v| v.parse::<i64>().ok()) else {
                continue;
            };
            let Some(created_at) = Utc.timestamp_millis_opt(created_ms).single() else {
                continue;
            };
            entries.push(SessionJobEntry {
                job_id,
                created_at,
                name: owner.get("name").cloned(),
            });
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    /// Whether a job belongs to the session. Errors degrade to `false`.
    pub async fn owns_job(&self, session_id: &str, job_id: &JobId) -> bool {
        self.cache
            .set_contains(&keys::session_jobs(session_id), job_id.as_str())
            .await
            .unwrap_or(false)
    }

    /// Rename a job. Fails unless the job belongs to the session.
    pub async fn rename_job(&self, session_id: &str, job_id: &JobId, name: &str) -> bool {
        let result = async {
            let is_member = self
                .cache
                .set_contains(&keys::session_jobs(session_id), job_id.as_str())
                .await?;
            if !is_member {
                debug!(session_id, job_id = %job_id, "rename refused, job not in session");
                return Ok::<bool, tpdf_cache::CacheError>(false);
            }

            self.cache
                .hash_set(&keys::job_owner(job_id), &[("name", name.to_string())], SESSION_TTL)
                .await?;
            Ok(true)
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!(session_id, job_id = %job_id, "failed to rename job: {}", e);
            false
        })
    }

    /// Merge settings into the session's settings map.
    pub async fn save_settings(
        &self,
        session_id: &str,
        settings: HashMap<String, serde_json::Value>,
    ) -> bool {
        let Some(mut session) = self.get_session(session_id).await else {
            return false;
        };
        session.settings.extend(settings);
        self.cache
            .set(&keys::session(session_id), &session, SESSION_TTL)
            .await
    }

    /// Fetch the session's settings map.
    pub async fn get_settings(&self, session_id: &str) -> HashMap<String, serde_json::Value> {
        self.get_session(session_id)
            .await
            .map(|s| s.settings)
            .unwrap_or_default()
    }
}
