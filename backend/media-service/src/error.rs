/// Error types for Media Service
use event_bus::HandlerError;
use thiserror::Error;

/// Result type for media-service operations
pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Object storage rejected or failed the request
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Store and storage failures are transient from a consumer's point of view
impl From<MediaError> for HandlerError {
    fn from(err: MediaError) -> Self {
        HandlerError::failed(err.to_string())
    }
}
