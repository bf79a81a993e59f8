//! Integration tests against a live Redis
//!
//! These tests require a running Redis instance at `REDIS_URL`.
//! Run with: cargo test --test redis_integration -- --ignored

use agora_cache::{ttl, CacheCoordinator, CacheKey, CacheStore, RedisStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_prefix_invalidation_uses_scan() {
    let store = RedisStore::connect(&redis_url())
        .await
        .expect("Failed to connect to Redis");
    let cache = CacheCoordinator::new(Arc::new(store.clone()));

    let run = run_id();
    let prefix = format!("itposts{}:", run);
    for page in 1..=150 {
        store
            .set_ex(&format!("{}{}:10", prefix, page), "[]".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
    }
    let unrelated = format!("itpost{}:42", run);
    store
        .set_ex(&unrelated, "{}".to_string(), Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(cache.invalidate_by_prefix(&prefix).await, 150);
    assert_eq!(store.get(&unrelated).await.unwrap(), Some("{}".to_string()));

    cache.invalidate(&[unrelated]).await;
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_read_through_against_redis() {
    let store = RedisStore::connect(&redis_url())
        .await
        .expect("Failed to connect to Redis");
    let cache = CacheCoordinator::new(Arc::new(store));
    let key = CacheKey::post(&format!("it-{}", run_id()));
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
        let value: Result<String, String> = cache
            .get_or_compute(&key, ttl::POST, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("hello".to_string())
            })
            .await;
        assert_eq!(value.unwrap(), "hello");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.invalidate(&[key]).await, 1);
}

fn run_id() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}
