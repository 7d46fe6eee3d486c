//! Cache store integration tests.
//!
//! Tests that need a live Redis are `#[ignore]`d; run them with
//! `cargo test -- --ignored` against a local broker.

use std::time::Duration;

use tpdf_cache::{CacheConfig, CacheStore, CacheTier};

fn test_store() -> CacheStore {
    let config = CacheConfig {
        redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        prefix: format!("tpdf:test:{}:", uuid_suffix()),
    };
    CacheStore::new(config).expect("store")
}

fn uuid_suffix() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos()
}

#[tokio::test]
async fn get_fails_open_when_broker_is_unreachable() {
    let config = CacheConfig {
        redis_url: "redis://127.0.0.1:1".to_string(),
        prefix: "tpdf:test:down:".to_string(),
    };
    let store = CacheStore::new(config).expect("store");

    // A store outage is a cache miss, not an error.
    let value: Option<String> = store.get("anything").await;
    assert!(value.is_none());

    // And a lost write is a logged false.
    assert!(!store.set("anything", &"value", Duration::from_secs(10)).await);
    assert!(!store.exists("anything").await);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn set_get_remove_round_trip() {
    let store = test_store();

    assert!(store.set("k1", &"v1", Duration::from_secs(30)).await);
    assert_eq!(store.get::<String>("k1").await.as_deref(), Some("v1"));
    assert!(store.exists("k1").await);

    store.remove("k1").await.unwrap();
    assert!(store.get::<String>("k1").await.is_none());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn clear_by_pattern_only_touches_matching_keys() {
    let store = test_store();

    store.set_with_priority("job_a_ocr", &"text", CacheTier::Short).await;
    store.set_with_priority("job_a_translate", &"text", CacheTier::Short).await;
    store.set_with_priority("session:s1", &"data", CacheTier::Medium).await;

    let removed = store.clear_by_pattern("job_a").await.unwrap();
    assert_eq!(removed, 2);
    assert!(store.get::<String>("session:s1").await.is_some());

    store.clear().await.unwrap();
    assert!(store.get::<String>("session:s1").await.is_none());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn stats_count_entries_by_type_tag() {
    let store = test_store();

    store.set_with_priority("ocr_abc", &"text", CacheTier::Long).await;
    store.set_with_priority("ocr_def", &"text", CacheTier::Long).await;
    store.set_with_priority("translate_abc", &"text", CacheTier::Long).await;

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_items, 3);
    assert_eq!(stats.types.get("ocr"), Some(&2));
    assert_eq!(stats.types.get("translate"), Some(&1));
    assert!(stats.oldest_expiry.is_some());

    store.clear().await.unwrap();
}
