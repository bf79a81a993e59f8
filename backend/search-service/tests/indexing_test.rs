//! Index maintenance driven by post events over the in-process broker.

use agora_cache::{CacheCoordinator, MemoryStore};
use chrono::Utc;
use event_bus::{BusConfig, ConnectionManager, InMemoryBroker, Publisher, SubscribeOptions, Subscriber};
use event_schema::{routing_keys, PostCreatedEvent, PostDeletedEvent};
use resilience::RetryConfig;
use search_service::{register_handlers, EventContext, InMemorySearchIndex, SearchService};
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_index_follows_post_lifecycle() {
    init_tracing();

    let broker = InMemoryBroker::new();
    let manager = Arc::new(ConnectionManager::new(
        BusConfig::new("memory://").with_service_name("search-it"),
        Arc::new(broker.clone()),
    ));
    let publisher = Publisher::new(manager.clone());
    let subscriber = Subscriber::new(manager);

    let index = InMemorySearchIndex::new();
    let cache = CacheCoordinator::new(Arc::new(MemoryStore::new()));
    let search = SearchService::new(Arc::new(index.clone()), cache.clone());

    let options = SubscribeOptions::default()
        .with_handler_retries(RetryConfig::fixed(1, Duration::from_millis(5)));
    let handles = register_handlers(
        &subscriber,
        EventContext::new(Arc::new(index.clone()), cache),
        options,
    )
    .await
    .unwrap();
    assert_eq!(handles.len(), 2);

    // Warm the query cache with an empty result
    assert!(search.search("borrow checker").await.unwrap().is_empty());

    publisher
        .publish(
            routing_keys::POST_CREATED,
            &PostCreatedEvent {
                post_id: "p1".to_string(),
                user_id: "u1".to_string(),
                content: "Taming the borrow checker".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    assert!(eventually(|| index.contains("p1")).await);
    // Handler ack comes after invalidation
    assert!(eventually(|| broker.acks() == 1).await);
    assert_eq!(search.search("Borrow Checker").await.unwrap().len(), 1);

    publisher
        .publish(
            routing_keys::POST_DELETED,
            &PostDeletedEvent {
                post_id: "p1".to_string(),
                user_id: "u1".to_string(),
                media_ids: vec![],
            },
        )
        .await
        .unwrap();
    assert!(eventually(|| broker.acks() == 2).await);
    assert!(!index.contains("p1"));
    assert!(search.search("borrow checker").await.unwrap().is_empty());
}
