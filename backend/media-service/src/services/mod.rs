/// Business logic layer for media-service
pub mod media;
pub mod storage;

pub use media::MediaService;
pub use storage::{InMemoryObjectStorage, ObjectStorage};
