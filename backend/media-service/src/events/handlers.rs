use crate::db::MediaStore;
use crate::services::ObjectStorage;
use async_trait::async_trait;
use event_bus::{Event, EventHandler, HandlerError, SubscribeOptions, Subscriber, SubscriptionHandle};
use event_schema::{routing_keys, PostDeletedEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared context for event consumers.
#[derive(Clone)]
pub struct EventContext {
    media: Arc<dyn MediaStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl EventContext {
    pub fn new(media: Arc<dyn MediaStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { media, storage }
    }
}

/// Removes the media a deleted post referenced.
///
/// Ids that no longer resolve are skipped, so a replayed or partially
/// processed event completes without error.
pub struct MediaCleanupHandler {
    ctx: EventContext,
}

impl MediaCleanupHandler {
    pub fn new(ctx: EventContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl EventHandler for MediaCleanupHandler {
    fn name(&self) -> &str {
        "media-cleanup"
    }

    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let event: PostDeletedEvent = event.decode()?;
        let mut removed = 0usize;

        for media_id in &event.media_ids {
            let Some(media) = self.ctx.media.find_by_id(media_id).await? else {
                debug!(media_id = %media_id, post_id = %event.post_id, "Media already removed");
                continue;
            };

            if media.user_id != event.user_id {
                warn!(
                    media_id = %media_id,
                    post_id = %event.post_id,
                    owner = %media.user_id,
                    "Skipping media owned by another user"
                );
                continue;
            }

            // Object first: a record without an object is never left behind
            self.ctx.storage.delete(&media.public_id).await?;
            self.ctx.media.delete(&media.id).await?;
            removed += 1;
        }

        info!(
            post_id = %event.post_id,
            requested = event.media_ids.len(),
            removed,
            "Processed deletion of media for post"
        );
        Ok(())
    }
}

/// Subscribe the media-service consumers. Call once at startup.
pub async fn register_handlers(
    subscriber: &Subscriber,
    ctx: EventContext,
    options: SubscribeOptions,
) -> event_bus::Result<Vec<SubscriptionHandle>> {
    let cleanup = subscriber
        .subscribe_with(
            &[routing_keys::POST_DELETED],
            Arc::new(MediaCleanupHandler::new(ctx)),
            options,
        )
        .await?;
    Ok(vec![cleanup])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryMediaStore;
    use crate::models::UploadMediaRequest;
    use crate::services::{InMemoryObjectStorage, MediaService};

    struct Fixture {
        handler: MediaCleanupHandler,
        service: MediaService,
        store: InMemoryMediaStore,
        storage: InMemoryObjectStorage,
    }

    fn fixture() -> Fixture {
        let store = InMemoryMediaStore::new();
        let storage = InMemoryObjectStorage::new("http://cdn.local");
        let ctx = EventContext::new(Arc::new(store.clone()), Arc::new(storage.clone()));
        Fixture {
            handler: MediaCleanupHandler::new(ctx),
            service: MediaService::new(Arc::new(store.clone()), Arc::new(storage.clone())),
            store,
            storage,
        }
    }

    async fn upload(service: &MediaService, user: &str) -> String {
        service
            .upload(user, UploadMediaRequest::new("a.png", "image/png", vec![1]))
            .await
            .unwrap()
            .id
    }

    fn deleted(user: &str, media_ids: Vec<String>) -> Event {
        let payload = PostDeletedEvent {
            post_id: "p1".to_string(),
            user_id: user.to_string(),
            media_ids,
        };
        Event::json(routing_keys::POST_DELETED, &payload).unwrap()
    }

    #[tokio::test]
    async fn test_removes_records_and_objects() {
        let f = fixture();
        let a = upload(&f.service, "u1").await;
        let b = upload(&f.service, "u1").await;
        let kept = upload(&f.service, "u1").await;

        f.handler.handle(&deleted("u1", vec![a, b])).await.unwrap();

        assert_eq!(f.store.len(), 1);
        assert_eq!(f.storage.len(), 1);
        assert!(f.service.get(&kept).await.is_ok());
    }

    #[tokio::test]
    async fn test_replay_and_unknown_ids_succeed() {
        let f = fixture();
        let a = upload(&f.service, "u1").await;
        let event = deleted("u1", vec![a, "never-existed".to_string()]);

        f.handler.handle(&event).await.unwrap();
        f.handler.handle(&event).await.unwrap();
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_media_of_other_user_is_kept() {
        let f = fixture();
        let foreign = upload(&f.service, "u2").await;

        f.handler.handle(&deleted("u1", vec![foreign])).await.unwrap();
        assert_eq!(f.store.len(), 1);
        assert_eq!(f.storage.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_retryable() {
        let f = fixture();
        let a = upload(&f.service, "u1").await;
        f.storage.fail_next_deletes(1);

        let err = f.handler.handle(&deleted("u1", vec![a.clone()])).await.unwrap_err();
        assert!(err.is_retryable());
        // Record survives so the retry can find it
        assert!(f.service.get(&a).await.is_ok());

        f.handler.handle(&deleted("u1", vec![a])).await.unwrap();
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_not_retryable() {
        let f = fixture();
        let event = Event::new(routing_keys::POST_DELETED, b"{\"postId\":".to_vec());
        let err = f.handler.handle(&event).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
