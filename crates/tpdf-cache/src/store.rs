//! The shared TTL key/value store.

use std::collections::HashMap;
use std::time::Duration;

use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CacheResult;

/// Priority tier mapped to a TTL bucket.
///
/// Writes pick a tier by expected reuse value: job-scoped intermediates are
/// short-lived, session state medium, content-addressed stage outputs long
/// (they are the expensive ones worth keeping around).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// ~1 hour
    Short,
    /// ~6 hours
    Medium,
    /// ~24 hours
    Long,
}

impl CacheTier {
    pub fn ttl(&self) -> Duration {
        match self {
            CacheTier::Short => Duration::from_secs(60 * 60),
            CacheTier::Medium => Duration::from_secs(6 * 60 * 60),
            CacheTier::Long => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Cache store configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis URL
    pub redis_url: String,
    /// Application namespace prepended to every key
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            prefix: "tpdf:cache:".to_string(),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            prefix: std::env::var("CACHE_PREFIX").unwrap_or_else(|_| "tpdf:cache:".to_string()),
        }
    }
}

/// Aggregate cache statistics for the admin endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total_items: u64,
    /// Entry count per key-type tag (the part before the first `_` or `:`)
    pub types: HashMap<String, u64>,
    /// Epoch millis of the soonest expiry
    pub oldest_expiry: Option<i64>,
    /// Epoch millis of the latest expiry
    pub newest_expiry: Option<i64>,
}

/// The shared Redis-backed cache store.
///
/// Every operation acquires a fresh multiplexed connection from the client,
/// so a dropped connection heals on the next call instead of poisoning a
/// cached handle.
pub struct CacheStore {
    client: redis::Client,
    config: CacheConfig,
}

impl CacheStore {
    /// Create a new cache store.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::new(CacheConfig::from_env())
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    async fn conn(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    // ------------------------------------------------------------------
    // Strict variants: errors propagate. Used where a store failure must
    // surface to the caller (job records, session state).
    // ------------------------------------------------------------------

    /// Store a JSON value with an explicit TTL.
    pub async fn try_set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(value)?;
        conn.set_ex::<_, _, ()>(self.full_key(key), payload, ttl.as_secs()).await?;
        Ok(())
    }

    /// Fetch a JSON value.
    pub async fn try_get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(self.full_key(key)).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Fail-open variants: a store outage degrades to a cache miss (get)
    // or a logged false (set). Correctness never depends on these.
    // ------------------------------------------------------------------

    /// Store a JSON value; returns whether the write succeeded.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        match self.try_set(key, value, ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, "cache set failed: {}", e);
                false
            }
        }
    }

    /// Store a JSON value under a priority tier.
    pub async fn set_with_priority<T: Serialize>(&self, key: &str, value: &T, tier: CacheTier) -> bool {
        self.set(key, value, tier.ttl()).await
    }

    /// Fetch a JSON value, treating any failure as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, "cache get failed, treating as miss: {}", e);
                None
            }
        }
    }

    /// Whether a live (unexpired) entry exists for the key.
    pub async fn exists(&self, key: &str) -> bool {
        let result: CacheResult<bool> = async {
            let mut conn = self.conn().await?;
            let ttl: i64 = conn.ttl(self.full_key(key)).await?;
            // TTL > 0 means the key exists and has not expired; -1 means it
            // exists without an expiry (we always set one, but be lenient).
            Ok(ttl > 0 || ttl == -1)
        }
        .await;
        result.unwrap_or(false)
    }

    /// Delete a single entry.
    pub async fn remove(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(self.full_key(key)).await?;
        Ok(())
    }

    /// Delete every entry under the application prefix.
    pub async fn clear(&self) -> CacheResult<u64> {
        self.clear_by_pattern("").await
    }

    /// Delete every entry whose (unprefixed) key starts with `pattern`.
    pub async fn clear_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.conn().await?;
        let match_pattern = format!("{}{}*", self.config.prefix, pattern);
        let mut removed = 0u64;
        let mut cursor = 0u64;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&match_pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = conn.del(&keys).await?;
                removed += deleted;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern, removed, "cleared cache entries");
        Ok(removed)
    }

    /// List all (unprefixed) keys under the application namespace.
    pub async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let match_pattern = format!("{}*", self.config.prefix);
        let mut found = Vec::new();
        let mut cursor = 0u64;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&match_pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            for key in keys {
                found.push(key.trim_start_matches(&self.config.prefix).to_string());
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(found)
    }

    /// Collect aggregate statistics over the namespace.
    pub async fn stats(&self) -> CacheResult<CacheStats> {
        let keys = self.keys().await?;
        let mut conn = self.conn().await?;
        let mut stats = CacheStats {
            total_items: keys.len() as u64,
            ..Default::default()
        };

        let now_ms = chrono::Utc::now().timestamp_millis();
        for key in &keys {
            let type_tag = key
                .split(|c| c == '_' || c == ':')
                .next()
                .unwrap_or("other")
                .to_string();
            *stats.types.entry(type_tag).or_insert(0) += 1;

            let ttl: i64 = conn.ttl(self.full_key(key)).await?;
            if ttl <= 0 {
                continue;
            }
            let expiry = now_ms + ttl * 1000;
            stats.oldest_expiry = Some(stats.oldest_expiry.map_or(expiry, |e| e.min(expiry)));
            stats.newest_expiry = Some(stats.newest_expiry.map_or(expiry, |e| e.max(expiry)));
        }

        Ok(stats)
    }

    // ------------------------------------------------------------------
    // Set/hash primitives used by the session ledger.
    // ------------------------------------------------------------------

    /// Add a member to a namespaced set and refresh its TTL.
    pub async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let full = self.full_key(key);
        conn.sadd::<_, _, ()>(&full, member).await?;
        conn.expire::<_, ()>(&full, ttl.as_secs() as i64).await?;
        Ok(())
    }

    /// All members of a namespaced set.
    pub async fn set_members(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.smembers(self.full_key(key)).await?)
    }

    /// Whether a member belongs to a namespaced set.
    pub async fn set_contains(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.sismember(self.full_key(key), member).await?)
    }

    /// Merge fields into a namespaced hash and refresh its TTL.
    pub async fn hash_set(&self, key: &str, fields: &[(&str, String)], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let full = self.full_key(key);
        for (field, value) in fields {
            conn.hset::<_, _, _, ()>(&full, *field, value).await?;
        }
        conn.expire::<_, ()>(&full, ttl.as_secs() as i64).await?;
        Ok(())
    }

    /// All fields of a namespaced hash.
    pub async fn hash_get_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        Ok(conn.hgetall(self.full_key(key)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ttls_are_ordered() {
        assert!(CacheTier::Short.ttl() < CacheTier::Medium.ttl());
        assert!(CacheTier::Medium.ttl() < CacheTier::Long.ttl());
        assert_eq!(CacheTier::Long.ttl(), Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn config_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.prefix, "tpdf:cache:");
    }

    // Live Redis coverage for set/get/clear_by_pattern lives in
    // tests/store_tests.rs.
}
