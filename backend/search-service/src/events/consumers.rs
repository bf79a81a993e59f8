use crate::services::{PostDocument, SearchIndex};
use agora_cache::{CacheCoordinator, CacheKey};
use async_trait::async_trait;
use event_bus::{Event, EventHandler, HandlerError, SubscribeOptions, Subscriber, SubscriptionHandle};
use event_schema::{routing_keys, PostCreatedEvent, PostDeletedEvent};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared context for event consumers.
///
/// Every index change drops the cached query results, which may now be stale.
#[derive(Clone)]
pub struct EventContext {
    index: Arc<dyn SearchIndex>,
    cache: CacheCoordinator,
}

impl EventContext {
    pub fn new(index: Arc<dyn SearchIndex>, cache: CacheCoordinator) -> Self {
        Self { index, cache }
    }

    async fn invalidate_queries(&self) {
        let removed = self.cache.invalidate_by_prefix(CacheKey::SEARCH_PREFIX).await;
        debug!(removed, "Invalidated cached search results");
    }
}

/// Indexes newly created posts
pub struct PostIndexHandler {
    ctx: EventContext,
}

impl PostIndexHandler {
    pub fn new(ctx: EventContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl EventHandler for PostIndexHandler {
    fn name(&self) -> &str {
        "search-index"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let event: PostCreatedEvent = event.decode()?;

        self.ctx
            .index
            .upsert(PostDocument {
                post_id: event.post_id.clone(),
                user_id: event.user_id,
                content: event.content,
                created_at: event.created_at,
            })
            .await?;
        self.ctx.invalidate_queries().await;

        info!(post_id = %event.post_id, "Indexed post for search");
        Ok(())
    }
}

/// Removes deleted posts from the index
pub struct PostRemovalHandler {
    ctx: EventContext,
}

impl PostRemovalHandler {
    pub fn new(ctx: EventContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl EventHandler for PostRemovalHandler {
    fn name(&self) -> &str {
        "search-removal"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let event: PostDeletedEvent = event.decode()?;

        let removed = self.ctx.index.remove(&event.post_id).await?;
        self.ctx.invalidate_queries().await;

        if removed {
            info!(post_id = %event.post_id, "Removed post from search index");
        } else {
            debug!(post_id = %event.post_id, "Post was not indexed");
        }
        Ok(())
    }
}

/// Subscribe the search-service consumers. Call once at startup.
pub async fn register_handlers(
    subscriber: &Subscriber,
    ctx: EventContext,
    options: SubscribeOptions,
) -> event_bus::Result<Vec<SubscriptionHandle>> {
    let created = subscriber
        .subscribe_with(
            &[routing_keys::POST_CREATED],
            Arc::new(PostIndexHandler::new(ctx.clone())),
            options.clone(),
        )
        .await?;
    let deleted = subscriber
        .subscribe_with(
            &[routing_keys::POST_DELETED],
            Arc::new(PostRemovalHandler::new(ctx)),
            options,
        )
        .await?;
    Ok(vec![created, deleted])
}
