//! Worker configuration.

use std::time::Duration;

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent pipeline units per stage (the semaphore bound)
    pub stage_concurrency: usize,
    /// Messages fetched per poll; also the broker-side prefetch bound
    pub prefetch: usize,
    /// Deadline applied to every collaborator call
    pub collaborator_timeout: Duration,
    /// Directory for rendered PDF artifacts
    pub output_dir: String,
    /// How often to scan for orphaned pending messages
    pub claim_interval: Duration,
    /// Back-off after a failed fetch (broker unreachable)
    pub reconnect_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            stage_concurrency: 3,
            prefetch: 3,
            collaborator_timeout: Duration::from_secs(120),
            output_dir: "./output".to_string(),
            claim_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            stage_concurrency: std::env::var("WORKER_STAGE_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            prefetch: std::env::var("WORKER_PREFETCH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            collaborator_timeout: Duration::from_secs(
                std::env::var("WORKER_COLLABORATOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "./output".to_string()),
            claim_interval: Duration::from_secs(
                std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            reconnect_delay: Duration::from_secs(
                std::env::var("WORKER_RECONNECT_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }
}
