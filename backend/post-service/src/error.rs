/// Error types for Post Service
use event_bus::BusError;
use thiserror::Error;

/// Result type for post-service operations
pub type Result<T> = std::result::Result<T, PostError>;

#[derive(Error, Debug)]
pub enum PostError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown post, or a post the caller does not own
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    /// The write is committed but its event never reached the broker
    #[error("Post {post_id} was saved but its event could not be published: {source}")]
    EventPublish {
        post_id: String,
        #[source]
        source: BusError,
    },
}

impl PostError {
    /// Whether the underlying write was committed despite the error
    pub fn write_committed(&self) -> bool {
        matches!(self, PostError::EventPublish { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_publish_keeps_write() {
        let err = PostError::EventPublish {
            post_id: "42".to_string(),
            source: BusError::Publish("channel gone".to_string()),
        };
        assert!(err.write_committed());
        assert_eq!(
            err.to_string(),
            "Post 42 was saved but its event could not be published: Publish error: channel gone"
        );

        assert!(!PostError::NotFound("post 42".to_string()).write_committed());
    }
}
