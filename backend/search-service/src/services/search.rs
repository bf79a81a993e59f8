use crate::error::{Result, SearchError};
use crate::services::index::{tokenize, PostDocument, SearchIndex};
use agora_cache::{ttl, CacheCoordinator, CacheKey};
use std::sync::Arc;
use tracing::debug;

/// Maximum number of results per query
pub const SEARCH_LIMIT: usize = 10;

#[derive(Clone)]
pub struct SearchService {
    index: Arc<dyn SearchIndex>,
    cache: CacheCoordinator,
}

impl SearchService {
    pub fn new(index: Arc<dyn SearchIndex>, cache: CacheCoordinator) -> Self {
        Self { index, cache }
    }

    /// Case-insensitive term search, read through the query cache
    pub async fn search(&self, query: &str) -> Result<Vec<PostDocument>> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Err(SearchError::InvalidQuery(
                "query must contain at least one word".to_string(),
            ));
        }

        let index = self.index.clone();
        let key = CacheKey::search(query);
        let results = self
            .cache
            .get_or_compute(&key, ttl::SEARCH, || async move {
                index.search(&terms, SEARCH_LIMIT).await
            })
            .await?;

        debug!(query = %query, results = results.len(), "Search completed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemorySearchIndex;
    use agora_cache::MemoryStore;
    use chrono::Utc;

    fn doc(id: &str, content: &str) -> PostDocument {
        PostDocument {
            post_id: id.to_string(),
            user_id: "u1".to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_results_are_cached_per_normalized_query() {
        let index = InMemorySearchIndex::new();
        let store = MemoryStore::new();
        let service = SearchService::new(
            Arc::new(index.clone()),
            CacheCoordinator::new(Arc::new(store.clone())),
        );
        index.upsert(doc("1", "Hello World")).await.unwrap();

        assert_eq!(service.search("hello").await.unwrap().len(), 1);
        assert!(store.contains(&CacheKey::search("hello")));

        // Stale until invalidated
        index.upsert(doc("2", "hello again")).await.unwrap();
        assert_eq!(service.search("  HELLO ").await.unwrap().len(), 1);

        service.cache.invalidate_by_prefix(CacheKey::SEARCH_PREFIX).await;
        assert_eq!(service.search("hello").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let service = SearchService::new(
            Arc::new(InMemorySearchIndex::new()),
            CacheCoordinator::new(Arc::new(MemoryStore::new())),
        );
        assert!(matches!(
            service.search("  !! ").await,
            Err(SearchError::InvalidQuery(_))
        ));
    }
}
