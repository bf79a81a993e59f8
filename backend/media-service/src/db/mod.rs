/// Database access layer for media-service
pub mod media_repo;

pub use media_repo::{InMemoryMediaStore, MediaStore};
