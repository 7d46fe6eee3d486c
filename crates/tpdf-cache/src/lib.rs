//! Content-addressed Redis cache store.
//!
//! This crate provides:
//! - A namespaced TTL key/value store shared by every component
//! - Deterministic cache key derivation from content hashes
//! - Priority-tiered expiration (short/medium/long)
//! - The pipeline metrics sink (stage timers, cache hit/miss counters)

pub mod error;
pub mod key;
pub mod metrics;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use key::{content_key, hash_bytes};
pub use metrics::{MetricSample, PipelineMetrics, StageTimer, METRICS_KEY_PREFIX};
pub use store::{CacheConfig, CacheStats, CacheStore, CacheTier};
