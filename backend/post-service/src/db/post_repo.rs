/// Post repository
use crate::error::{PostError, Result};
use crate::models::Post;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Storage operations for posts
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert(&self, post: Post) -> Result<Post>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Post>>;

    /// Posts newest first, skipping `offset`, plus the total count
    async fn list(&self, offset: usize, limit: usize) -> Result<(Vec<Post>, u64)>;

    /// Delete a post owned by `user_id`, returning the removed record
    async fn delete_owned(&self, id: &str, user_id: &str) -> Result<Option<Post>>;
}

/// Process-local post store
#[derive(Clone, Default)]
pub struct InMemoryPostStore {
    posts: Arc<RwLock<Vec<Post>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation until switched off
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.posts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.read().is_empty()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PostError::Database("post store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn insert(&self, post: Post) -> Result<Post> {
        self.check()?;

        let mut posts = self.posts.write();
        if posts.iter().any(|p| p.id == post.id) {
            return Err(PostError::Database(format!("duplicate post id {}", post.id)));
        }
        posts.push(post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Post>> {
        self.check()?;
        Ok(self.posts.read().iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<(Vec<Post>, u64)> {
        self.check()?;

        let posts = self.posts.read();
        let mut ordered: Vec<&Post> = posts.iter().collect();
        // Stable sort keeps insertion order reversed for equal timestamps
        ordered.reverse();
        ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let page = ordered
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, posts.len() as u64))
    }

    async fn delete_owned(&self, id: &str, user_id: &str) -> Result<Option<Post>> {
        self.check()?;

        let mut posts = self.posts.write();
        let Some(index) = posts
            .iter()
            .position(|p| p.id == id && p.user_id == user_id)
        else {
            return Ok(None);
        };
        Ok(Some(posts.remove(index)))
    }
}
