/// Data models for media-service
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored media record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    /// Object storage key
    pub public_id: String,
    pub original_name: String,
    pub mime_type: String,
    pub url: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UploadMediaRequest {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadMediaRequest {
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.bytes.is_empty() {
            return Err("file is empty".to_string());
        }
        if !(self.mime_type.starts_with("image/") || self.mime_type.starts_with("video/")) {
            return Err(format!("unsupported media type {}", self.mime_type));
        }
        Ok(())
    }
}

/// Storage key for a new upload owned by `user_id`
pub fn object_key(user_id: &str) -> String {
    format!("{}/{}", user_id, Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_validation() {
        assert!(UploadMediaRequest::new("a.png", "image/png", vec![1]).validate().is_ok());
        assert!(UploadMediaRequest::new("a.mp4", "video/mp4", vec![1]).validate().is_ok());
        assert!(UploadMediaRequest::new("a.png", "image/png", vec![]).validate().is_err());
        assert!(UploadMediaRequest::new("a.pdf", "application/pdf", vec![1])
            .validate()
            .is_err());
    }

    #[test]
    fn test_object_key_is_scoped_to_user() {
        let key = object_key("u1");
        assert!(key.starts_with("u1/"));
        assert_ne!(key, object_key("u1"));
    }
}
