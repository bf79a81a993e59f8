/// Media service - upload and lookup of media records
use crate::db::MediaStore;
use crate::error::{MediaError, Result};
use crate::models::{object_key, Media, UploadMediaRequest};
use crate::services::ObjectStorage;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct MediaService {
    media: Arc<dyn MediaStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl MediaService {
    pub fn new(media: Arc<dyn MediaStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { media, storage }
    }

    /// Store the object, then record it
    pub async fn upload(&self, user_id: &str, request: UploadMediaRequest) -> Result<Media> {
        request.validate().map_err(MediaError::Validation)?;

        let public_id = object_key(user_id);
        let url = self
            .storage
            .put(&public_id, request.bytes, &request.mime_type)
            .await?;

        let media = Media {
            id: Uuid::new_v4().to_string(),
            public_id: public_id.clone(),
            original_name: request.original_name,
            mime_type: request.mime_type,
            url,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        match self.media.insert(media).await {
            Ok(media) => {
                info!(media_id = %media.id, user_id = %user_id, "Media uploaded");
                Ok(media)
            }
            Err(err) => {
                // Do not leave an orphaned object behind
                if let Err(cleanup) = self.storage.delete(&public_id).await {
                    warn!(public_id = %public_id, "Failed to remove orphaned object: {cleanup}");
                }
                Err(err)
            }
        }
    }

    pub async fn get(&self, media_id: &str) -> Result<Media> {
        self.media
            .find_by_id(media_id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("media {}", media_id)))
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Media>> {
        self.media.list_by_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryMediaStore;
    use crate::services::InMemoryObjectStorage;

    fn service() -> (MediaService, InMemoryMediaStore, InMemoryObjectStorage) {
        let store = InMemoryMediaStore::new();
        let storage = InMemoryObjectStorage::new("http://cdn.local");
        let service = MediaService::new(Arc::new(store.clone()), Arc::new(storage.clone()));
        (service, store, storage)
    }

    #[tokio::test]
    async fn test_upload_stores_object_and_record() {
        let (service, store, storage) = service();
        let media = service
            .upload("u1", UploadMediaRequest::new("cat.png", "image/png", vec![7; 16]))
            .await
            .unwrap();

        assert_eq!(media.user_id, "u1");
        assert_eq!(media.url, format!("http://cdn.local/{}", media.public_id));
        assert_eq!(storage.size_of(&media.public_id), Some(16));
        assert_eq!(store.len(), 1);
        assert_eq!(service.get(&media.id).await.unwrap(), media);
    }

    #[tokio::test]
    async fn test_rejected_upload_stores_nothing() {
        let (service, store, storage) = service();
        let err = service
            .upload("u1", UploadMediaRequest::new("doc.pdf", "application/pdf", vec![1]))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Validation(_)));
        assert!(store.is_empty());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_list_for_user_only_returns_owned_media() {
        let (service, _, _) = service();
        service
            .upload("u1", UploadMediaRequest::new("a.png", "image/png", vec![1]))
            .await
            .unwrap();
        service
            .upload("u2", UploadMediaRequest::new("b.png", "image/png", vec![1]))
            .await
            .unwrap();

        let owned = service.list_for_user("u1").await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].original_name, "a.png");
        assert!(matches!(service.get("missing").await, Err(MediaError::NotFound(_))));
    }
}
