//! Application state.

use std::sync::Arc;

use tpdf_cache::{CacheStore, PipelineMetrics};
use tpdf_queue::StageQueue;
use tpdf_registry::{JobManager, SessionLedger};

use crate::config::ApiConfig;

/// Shared application state, injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub cache: Arc<CacheStore>,
    pub queue: Arc<StageQueue>,
    pub jobs: JobManager,
    pub sessions: SessionLedger,
    pub metrics: PipelineMetrics,
}

impl AppState {
    /// Create new application state from the environment.
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let cache = Arc::new(CacheStore::from_env()?);
        let queue = Arc::new(StageQueue::from_env()?);

        let jobs = JobManager::new(Arc::clone(&cache));
        let sessions = SessionLedger::new(Arc::clone(&cache));
        let metrics = PipelineMetrics::new(Arc::clone(&cache));

        Ok(Self {
            config,
            cache,
            queue,
            jobs,
            sessions,
            metrics,
        })
    }
}
