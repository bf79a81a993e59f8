/// Media repository - persistence for media records
use crate::error::{MediaError, Result};
use crate::models::Media;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn insert(&self, media: Media) -> Result<Media>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Media>>;

    /// Returns whether a record was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Media>>;
}

#[derive(Clone, Default)]
pub struct InMemoryMediaStore {
    records: Arc<DashMap<String, Media>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn insert(&self, media: Media) -> Result<Media> {
        if self.records.contains_key(&media.id) {
            return Err(MediaError::Database(format!("duplicate media id {}", media.id)));
        }
        self.records.insert(media.id.clone(), media.clone());
        Ok(media)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Media>> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.remove(id).is_some())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Media>> {
        let mut media: Vec<Media> = self
            .records
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        media.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(media)
    }
}
