//! Agora caching layer
//!
//! Read-through caching for list and detail queries with invalidation driven
//! by the writes that affect them:
//! - Deterministic key schema with collection prefixes
//! - No negative caching: absence and compute errors are never stored
//! - SCAN-based prefix invalidation (no blocking KEYS)
//! - Bounded store operations; a cache outage never fails the caller
//! - Metrics integration
//!
//! # Example
//!
//! ```no_run
//! use agora_cache::{ttl, CacheConfig, CacheCoordinator, CacheKey};
//!
//! # async fn load_page(page: u32, limit: u32) -> Result<Vec<String>, std::io::Error> { Ok(vec![]) }
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = CacheCoordinator::connect(&CacheConfig::from_env()?).await?;
//!
//! // Read path
//! let key = CacheKey::posts_page(1, 10);
//! let page = cache
//!     .get_or_compute(&key, ttl::POSTS_PAGE, || load_page(1, 10))
//!     .await?;
//!
//! // Write path, after the store commit
//! cache
//!     .invalidate_entity(&CacheKey::post("42"), CacheKey::POSTS_PREFIX)
//!     .await;
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod error;
mod keys;
mod memory;
mod metrics;
mod store;

pub use config::{CacheConfig, DEFAULT_OP_TIMEOUT};
pub use coordinator::CacheCoordinator;
pub use error::{CacheError, CacheResult};
pub use keys::CacheKey;
pub use memory::MemoryStore;
pub use metrics::CacheMetrics;
pub use store::{CacheStore, RedisStore, SharedRedis};

/// Default TTL values
pub mod ttl {
    use std::time::Duration;

    pub const POST: Duration = Duration::from_secs(3600); // 1 hour
    pub const POSTS_PAGE: Duration = Duration::from_secs(300); // 5 minutes
    pub const SEARCH: Duration = Duration::from_secs(300); // 5 minutes
}
