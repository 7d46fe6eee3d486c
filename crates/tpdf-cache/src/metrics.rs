//! Pipeline metrics sink.
//!
//! Workers report stage durations and cache hit/miss counts here. Samples
//! go two places: the process-wide `metrics` recorder (scraped from the API
//! server's `/metrics` route) and a capped per-metric list in Redis so the
//! reporting endpoint can aggregate across worker processes. Metrics are
//! best-effort; a failed write never fails the stage.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tpdf_models::JobId;

use crate::store::{CacheStore, CacheTier};

/// Key prefix for persisted metric sample lists.
pub const METRICS_KEY_PREFIX: &str = "monitoring:metrics:";

/// Samples kept per metric name.
const MAX_SAMPLES: usize = 1000;

/// One recorded measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Duration in milliseconds for timer metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Raw value for counter-style metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// An in-flight stage measurement. Finish it with
/// [`PipelineMetrics::end_measure`].
#[derive(Debug)]
pub struct StageTimer {
    name: String,
    job_id: String,
    started: Instant,
}

/// The metrics sink shared by all workers in a process.
#[derive(Clone)]
pub struct PipelineMetrics {
    cache: Arc<CacheStore>,
}

impl PipelineMetrics {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }

    /// Start measuring a named stage for a job.
    pub fn start_measure(&self, name: impl Into<String>, job_id: &JobId) -> StageTimer {
        StageTimer {
            name: name.into(),
            job_id: job_id.to_string(),
            started: Instant::now(),
        }
    }

    /// Finish a measurement, returning the elapsed milliseconds.
    pub async fn end_measure(&self, timer: StageTimer) -> f64 {
        let duration_ms = timer.started.elapsed().as_secs_f64() * 1000.0;
        histogram!("tpdf_stage_duration_ms", "stage" => timer.name.clone()).record(duration_ms);

        self.persist(
            &timer.name,
            MetricSample {
                job_id: Some(timer.job_id),
                duration_ms: Some(duration_ms),
                value: None,
                timestamp: Utc::now(),
            },
        )
        .await;

        duration_ms
    }

    /// Record a cache hit for a stage.
    pub async fn cache_hit(&self, stage: &str, job_id: &JobId) {
        counter!("tpdf_cache_hit_total", "stage" => stage.to_string()).increment(1);
        self.persist_named("cache_hit", job_id).await;
    }

    /// Record a cache miss for a stage.
    pub async fn cache_miss(&self, stage: &str, job_id: &JobId) {
        counter!("tpdf_cache_miss_total", "stage" => stage.to_string()).increment(1);
        self.persist_named("cache_miss", job_id).await;
    }

    async fn persist_named(&self, name: &str, job_id: &JobId) {
        self.persist(
            name,
            MetricSample {
                job_id: Some(job_id.to_string()),
                duration_ms: None,
                value: Some(1.0),
                timestamp: Utc::now(),
            },
        )
        .await;
    }

    async fn persist(&self, name: &str, sample: MetricSample) {
        let key = format!("{}{}", METRICS_KEY_PREFIX, name);
        let mut samples: Vec<MetricSample> = self.cache.get(&key).await.unwrap_or_default();
        samples.push(sample);
        if samples.len() > MAX_SAMPLES {
            let excess = samples.len() - MAX_SAMPLES;
            samples.drain(..excess);
        }
        if !self.cache.set_with_priority(&key, &samples, CacheTier::Long).await {
            debug!(name, "failed to persist metric sample");
        }
    }

    /// Fetch all persisted samples for a metric name.
    pub async fn samples(&self, name: &str) -> Vec<MetricSample> {
        let key = format!("{}{}", METRICS_KEY_PREFIX, name);
        self.cache.get(&key).await.unwrap_or_default()
    }
}
