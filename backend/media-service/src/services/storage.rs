/// Object storage for uploaded media
use crate::error::{MediaError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key`, returning the public URL
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Remove the object under `key`; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;
}

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Process-local object storage with failure injection
#[derive(Clone)]
pub struct InMemoryObjectStorage {
    base_url: String,
    objects: Arc<DashMap<String, StoredObject>>,
    failing_deletes: Arc<AtomicU32>,
}

impl InMemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Arc::new(DashMap::new()),
            failing_deletes: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Make the next `n` deletes fail
    pub fn fail_next_deletes(&self, n: u32) {
        self.failing_deletes.store(n, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn size_of(&self, key: &str) -> Option<usize> {
        self.objects.get(key).map(|object| object.bytes.len())
    }

    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.objects.get(key).map(|object| object.content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), key))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let injected = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(MediaError::Storage(format!("delete of {} failed", key)));
        }
        Ok(self.objects.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_returns_public_url() {
        let storage = InMemoryObjectStorage::new("http://cdn.local/media/");
        let url = storage.put("u1/abc", vec![1, 2, 3], "image/png").await.unwrap();
        assert_eq!(url, "http://cdn.local/media/u1/abc");
        assert_eq!(storage.size_of("u1/abc"), Some(3));
        assert_eq!(storage.content_type_of("u1/abc").as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_injected_delete_failures() {
        let storage = InMemoryObjectStorage::new("http://cdn.local");
        storage.put("k", vec![1], "image/png").await.unwrap();
        storage.fail_next_deletes(1);

        assert!(matches!(storage.delete("k").await, Err(MediaError::Storage(_))));
        assert!(storage.contains("k"));
        assert!(storage.delete("k").await.unwrap());
        assert!(!storage.delete("k").await.unwrap());
    }
}
