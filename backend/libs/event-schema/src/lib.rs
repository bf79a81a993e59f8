//! Event schemas for the domain events exchanged between services
//!
//! Every payload is self-contained: it carries all identifiers a consumer
//! needs to act without calling back into the producing service.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Routing keys published on the shared topic exchange
pub mod routing_keys {
    pub const POST_CREATED: &str = "post.created";
    pub const POST_DELETED: &str = "post.deleted";
    /// Every post lifecycle event
    pub const POST_ALL: &str = "post.*";
}

/// A payload bound to a single routing key
pub trait RoutedEvent: Serialize + DeserializeOwned + Send + Sync {
    const ROUTING_KEY: &'static str;
}

// ============================================================================
// POST SERVICE EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCreatedEvent {
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl RoutedEvent for PostCreatedEvent {
    const ROUTING_KEY: &'static str = routing_keys::POST_CREATED;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDeletedEvent {
    pub post_id: String,
    pub user_id: String,
    #[serde(default)]
    pub media_ids: Vec<String>,
}

impl RoutedEvent for PostDeletedEvent {
    const ROUTING_KEY: &'static str = routing_keys::POST_DELETED;
}
