//! Media Service
//!
//! Owns uploaded media records and the stored objects behind them.
//! Consumes `post.deleted` to remove the media a deleted post referenced.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod services;

// Public re-exports
pub use config::Config;
pub use db::{InMemoryMediaStore, MediaStore};
pub use error::{MediaError, Result};
pub use events::{register_handlers, EventContext, MediaCleanupHandler};
pub use models::{Media, UploadMediaRequest};
pub use services::{InMemoryObjectStorage, MediaService, ObjectStorage};
