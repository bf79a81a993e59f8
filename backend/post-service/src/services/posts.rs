/// Post service - business logic for post operations
use crate::config::Config;
use crate::db::PostStore;
use crate::error::{PostError, Result};
use crate::models::{normalize_paging, CreatePostRequest, Post, PostPage};
use agora_cache::{ttl, CacheCoordinator, CacheKey};
use event_bus::{ConnectionManager, Publisher};
use event_schema::{PostCreatedEvent, PostDeletedEvent, RoutedEvent};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn PostStore>,
    cache: CacheCoordinator,
    publisher: Publisher,
}

impl PostService {
    pub fn new(store: Arc<dyn PostStore>, cache: CacheCoordinator, publisher: Publisher) -> Self {
        Self {
            store,
            cache,
            publisher,
        }
    }

    /// Wire the service to Redis and RabbitMQ.
    ///
    /// Exits the process when the broker cannot be reached, at startup or
    /// on any later publish that exhausts the reconnect policy.
    pub async fn from_config(config: &Config, store: Arc<dyn PostStore>) -> anyhow::Result<Self> {
        let cache = CacheCoordinator::connect(&config.cache).await?;
        let manager = Arc::new(ConnectionManager::amqp(config.bus.clone()).exit_on_fatal());
        manager.connect_or_exit().await;
        Ok(Self::new(store, cache, Publisher::new(manager)))
    }

    pub async fn create_post(&self, user_id: &str, request: CreatePostRequest) -> Result<Post> {
        request.validate().map_err(PostError::Validation)?;

        let post = self.store.insert(Post::new(user_id, request)).await?;
        self.invalidate(&post.id).await;

        let event = PostCreatedEvent {
            post_id: post.id.clone(),
            user_id: post.user_id.clone(),
            content: post.content.clone(),
            created_at: post.created_at,
        };
        self.publish(&post.id, &event).await?;

        info!(post_id = %post.id, user_id = %post.user_id, "Post created");
        Ok(post)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post> {
        let store = self.store.clone();
        let key = CacheKey::post(post_id);
        self.cache
            .get_or_compute_optional(&key, ttl::POST, || async move {
                store.find_by_id(post_id).await
            })
            .await?
            .ok_or_else(|| PostError::NotFound(format!("post {}", post_id)))
    }

    /// Newest-first page; `page` and `limit` default to 1 and 10
    pub async fn list_posts(&self, page: Option<u32>, limit: Option<u32>) -> Result<PostPage> {
        let (page, limit) = normalize_paging(page, limit);
        let store = self.store.clone();
        let key = CacheKey::posts_page(page, limit);

        self.cache
            .get_or_compute(&key, ttl::POSTS_PAGE, || async move {
                let offset = (page as usize - 1) * limit as usize;
                let (posts, total) = store.list(offset, limit as usize).await?;
                Ok::<_, PostError>(PostPage::new(posts, page, limit, total))
            })
            .await
    }

    /// Delete a post owned by `user_id`.
    ///
    /// A post owned by someone else is reported as not found.
    pub async fn delete_post(&self, post_id: &str, user_id: &str) -> Result<Post> {
        let post = self
            .store
            .delete_owned(post_id, user_id)
            .await?
            .ok_or_else(|| PostError::NotFound(format!("post {}", post_id)))?;
        self.invalidate(&post.id).await;

        let event = PostDeletedEvent {
            post_id: post.id.clone(),
            user_id: post.user_id.clone(),
            media_ids: post.media_ids.clone(),
        };
        self.publish(&post.id, &event).await?;

        info!(post_id = %post.id, media = post.media_ids.len(), "Post deleted");
        Ok(post)
    }

    async fn invalidate(&self, post_id: &str) {
        self.cache
            .invalidate_entity(&CacheKey::post(post_id), CacheKey::POSTS_PREFIX)
            .await;
    }

    async fn publish<E: RoutedEvent + Serialize>(&self, post_id: &str, event: &E) -> Result<()> {
        self.publisher
            .publish(E::ROUTING_KEY, event)
            .await
            .map(|_| ())
            .map_err(|source| PostError::EventPublish {
                post_id: post_id.to_string(),
                source,
            })
    }
}
