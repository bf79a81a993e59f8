//! Cache key schema
//!
//! Keys are deterministic functions of the query parameters. Every key of
//! a collection shares the collection prefix so a write can bust all of
//! them with one prefix invalidation.

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Collection prefix shared by every post page key
    pub const POSTS_PREFIX: &'static str = "posts:";

    /// Collection prefix shared by every search result key
    pub const SEARCH_PREFIX: &'static str = "search:";

    // ============= Post Keys =============

    /// Single post
    /// Format: post:{post_id}
    pub fn post(post_id: &str) -> String {
        format!("post:{}", post_id)
    }

    /// One page of the post list
    /// Format: posts:{page}:{limit}
    pub fn posts_page(page: u32, limit: u32) -> String {
        format!("{}{}:{}", Self::POSTS_PREFIX, page, limit)
    }

    // ============= Search Keys =============

    /// Search results for a query, case and whitespace insensitive
    /// Format: search:{normalized query}
    pub fn search(query: &str) -> String {
        let normalized = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}{}", Self::SEARCH_PREFIX, normalized)
    }

    // ============= Utility =============

    /// Extract entity type from key
    pub fn entity_type(key: &str) -> Option<&str> {
        // Format: {entity}:...
        match key.split_once(':') {
            Some((entity, _)) if !entity.is_empty() => Some(entity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_key() {
        assert_eq!(CacheKey::post("42"), "post:42");
    }

    #[test]
    fn test_posts_page_key_shares_prefix() {
        let key = CacheKey::posts_page(2, 10);
        assert_eq!(key, "posts:2:10");
        assert!(key.starts_with(CacheKey::POSTS_PREFIX));
        assert!(!CacheKey::post("42").starts_with(CacheKey::POSTS_PREFIX));
    }

    #[test]
    fn test_search_key_is_normalized() {
        assert_eq!(CacheKey::search("  Rust   ASYNC "), "search:rust async");
        assert_eq!(CacheKey::search("rust async"), CacheKey::search("RUST  async"));
    }

    #[test]
    fn test_entity_type() {
        assert_eq!(CacheKey::entity_type("post:42"), Some("post"));
        assert_eq!(CacheKey::entity_type("posts:1:10"), Some("posts"));
        assert_eq!(CacheKey::entity_type("invalid"), None);
    }
}
