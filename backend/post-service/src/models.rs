/// Data models for post-service
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of a post body in characters
pub const MAX_CONTENT_LENGTH: usize = 5000;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub media_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(user_id: impl Into<String>, request: CreatePostRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            content: request.content,
            media_ids: request.media_ids,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub media_ids: Vec<String>,
}

impl CreatePostRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            media_ids: Vec::new(),
        }
    }

    pub fn with_media(mut self, media_ids: Vec<String>) -> Self {
        self.media_ids = media_ids;
        self
    }

    /// Returns the reason the request is rejected, if any
    pub fn validate(&self) -> Result<(), String> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err("content must not be empty".to_string());
        }
        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(format!(
                "content must be at most {} characters",
                MAX_CONTENT_LENGTH
            ));
        }
        if self.media_ids.iter().any(|id| id.trim().is_empty()) {
            return Err("media ids must not be empty".to_string());
        }
        Ok(())
    }
}

/// Page of posts, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_posts: u64,
}

impl PostPage {
    pub fn new(posts: Vec<Post>, page: u32, limit: u32, total_posts: u64) -> Self {
        let total_pages = total_posts.div_ceil(u64::from(limit.max(1)));
        Self {
            posts,
            current_page: page,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            total_posts,
        }
    }
}

/// Resolve optional paging parameters to a (page, limit) pair
pub fn normalize_paging(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
    let limit = limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT);
    (page, limit)
}
