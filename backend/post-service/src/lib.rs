/// Post Service Library
///
/// Owns posts and is the producer of post lifecycle events.
///
/// Every write runs in the same order: commit to the store, invalidate the
/// cached views it affects, then publish the domain event. Reads of single
/// posts and of paginated listings go through the read-through cache.
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use config::Config;
pub use db::{InMemoryPostStore, PostStore};
pub use error::{PostError, Result};
pub use models::{CreatePostRequest, Post, PostPage};
pub use services::PostService;
