//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::admin::{cache_stats, clear_cache, performance_report};
use crate::handlers::health;
use crate::handlers::jobs::{archive_job, download_job, get_job, get_job_result, preview_job};
use crate::handlers::upload::process_images;
use crate::handlers::user::{get_history, get_settings, rename_job, save_settings};
use crate::session::session_middleware;
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/process-images", post(process_images))
        .route("/job/:job_id", get(get_job))
        .route("/job/:job_id/result", get(get_job_result))
        .route("/job/:job_id/archive", post(archive_job))
        .route("/preview/:job_id", get(preview_job))
        .route("/download/:job_id", get(download_job))
        .route("/user/history", get(get_history))
        .route("/user/rename/:job_id", post(rename_job))
        .route("/user/settings", get(get_settings).post(save_settings))
        .route("/cache-stats", get(cache_stats))
        .route("/clear-cache", post(clear_cache))
        .route("/performance", get(performance_report))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware));

    let mut router = Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes);

    if let Some(handle) = metrics_handle {
        router = router.route("/metrics", get(move || async move { handle.render() }));
    }

    router
        .layer(DefaultBodyLimit::max(state.config.max_upload_size + 1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
