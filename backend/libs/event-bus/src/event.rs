//! Event envelope and inbound deliveries

use crate::{HandlerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// A routed domain event.
///
/// `payload` holds the encoded domain record and travels to consumers
/// byte-for-byte. Message id, type and production time are carried as
/// broker message properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub message_id: Uuid,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub produced_at: DateTime<Utc>,
}

impl Event {
    /// Wrap already-encoded payload bytes
    pub fn new(routing_key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            routing_key: routing_key.into(),
            payload,
            produced_at: Utc::now(),
        }
    }

    /// Encode `payload` as JSON
    pub fn json<T: Serialize + ?Sized>(routing_key: impl Into<String>, payload: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(payload)?;
        Ok(Self::new(routing_key, bytes))
    }

    /// Decode the JSON payload into a domain record
    pub fn decode<T: DeserializeOwned>(&self) -> std::result::Result<T, HandlerError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Settles a delivery with the broker
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<()>;

    /// Negative acknowledgement; `requeue` asks the broker to redeliver
    async fn nack(&self, requeue: bool) -> Result<()>;
}

/// A message handed to a subscriber by the broker
pub struct Delivery {
    pub event: Event,
    /// Set when the broker has delivered this message before
    pub redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(event: Event, redelivered: bool, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            event,
            redelivered,
            acker,
        }
    }

    pub async fn ack(&self) -> Result<()> {
        self.acker.ack().await
    }

    pub async fn nack(&self, requeue: bool) -> Result<()> {
        self.acker.nack(requeue).await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("event", &self.event)
            .field("redelivered", &self.redelivered)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        id: String,
    }

    #[test]
    fn test_json_event_roundtrip() {
        let event = Event::json("post.created", &Sample { id: "42".into() }).unwrap();
        assert_eq!(event.routing_key, "post.created");
        assert_eq!(event.payload, br#"{"id":"42"}"#.to_vec());

        let decoded: Sample = event.decode().unwrap();
        assert_eq!(decoded, Sample { id: "42".into() });
    }

    #[test]
    fn test_decode_failure_is_decode_error() {
        let event = Event::new("post.created", b"not json".to_vec());
        let err = event.decode::<Sample>().unwrap_err();
        assert!(matches!(err, HandlerError::Decode(_)));
    }

    #[test]
    fn test_new_events_get_distinct_ids() {
        let a = Event::new("post.created", Vec::new());
        let b = Event::new("post.created", Vec::new());
        assert_ne!(a.message_id, b.message_id);
    }
}
