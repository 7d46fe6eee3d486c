//! Cache and queue administration.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use tpdf_cache::CacheStats;
use tpdf_models::Stage;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub cache: CacheStats,
    /// Backlog per stage queue; zeros when the broker is unreachable
    #[serde(rename = "queueCounts")]
    pub queue_counts: HashMap<String, u64>,
    #[serde(rename = "dlqCount")]
    pub dlq_count: u64,
}

/// GET /api/cache-stats
pub async fn cache_stats(State(state): State<AppState>) -> ApiResult<Json<CacheStatsResponse>> {
    let cache = state.cache.stats().await?;

    // Queue introspection is informational; a broker hiccup degrades to
    // zero counts rather than failing the endpoint.
    let mut queue_counts = HashMap::new();
    for stage in Stage::ALL {
        let len = match state.queue.len(stage).await {
            Ok(len) => len,
            Err(e) => {
                warn!(stage = %stage, "failed to read queue length: {}", e);
                0
            }
        };
        queue_counts.insert(stage.as_str().to_string(), len);
    }
    let dlq_count = state.queue.dlq_len().await.unwrap_or(0);

    Ok(Json(CacheStatsResponse {
        success: true,
        cache,
        queue_counts,
        dlq_count,
    }))
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub success: bool,
    pub removed: u64,
}

/// POST /api/clear-cache
pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<ClearCacheResponse>> {
    let removed = state.cache.clear().await?;
    Ok(Json(ClearCacheResponse {
        success: true,
        removed,
    }))
}

#[derive(Debug, Default, Serialize)]
pub struct StageReport {
    pub count: usize,
    #[serde(rename = "avgMs", skip_serializing_if = "Option::is_none")]
    pub avg_ms: Option<f64>,
    #[serde(rename = "minMs", skip_serializing_if = "Option::is_none")]
    pub min_ms: Option<f64>,
    #[serde(rename = "maxMs", skip_serializing_if = "Option::is_none")]
    pub max_ms: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PerformanceReport {
    pub stages: HashMap<String, StageReport>,
    #[serde(rename = "cacheHits")]
    pub cache_hits: usize,
    #[serde(rename = "cacheMisses")]
    pub cache_misses: usize,
}

/// GET /api/performance
///
/// Aggregates the duration samples the workers persist, across all worker
/// processes (the in-process Prometheus recorder only sees this process).
pub async fn performance_report(State(state): State<AppState>) -> ApiResult<Json<PerformanceReport>> {
    let mut stages = HashMap::new();
    for stage in Stage::ALL {
        let samples = state.metrics.samples(stage.as_str()).await;
        let durations: Vec<f64> = samples.iter().filter_map(|s| s.duration_ms).collect();

        let mut report = StageReport {
            count: durations.len(),
            ..Default::default()
        };
        if !durations.is_empty() {
            report.avg_ms = Some(durations.iter().sum::<f64>() / durations.len() as f64);
            report.min_ms = durations.iter().copied().reduce(f64::min);
            report.max_ms = durations.iter().copied().reduce(f64::max);
        }
        stages.insert(stage.as_str().to_string(), report);
    }

    let cache_hits = state.metrics.samples("cache_hit").await.len();
    let cache_misses = state.metrics.samples("cache_miss").await.len();

    Ok(Json(PerformanceReport {
        stages,
        cache_hits,
        cache_misses,
    }))
}
