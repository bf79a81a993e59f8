//! Event publishing
//!
//! Fire-and-forget by default: `publish` returns once the message is handed
//! to the channel. A channel that dies mid-send loses the event and nothing
//! retries it. Enable `publisher_confirms` to wait for the broker instead.

use crate::manager::ConnectionManager;
use crate::metrics::BusMetrics;
use crate::topic::validate_routing_key;
use crate::{Event, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct Publisher {
    manager: Arc<ConnectionManager>,
    metrics: BusMetrics,
}

impl Publisher {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            metrics: BusMetrics::new(),
        }
    }

    /// Publish `payload` as JSON under `routing_key`.
    ///
    /// Connects lazily: the first publish in a process pays the connect cost.
    /// Returns the message id assigned to the event.
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        routing_key: &str,
        payload: &T,
    ) -> Result<Uuid> {
        validate_routing_key(routing_key)?;
        let event = Event::json(routing_key, payload)?;
        self.publish_event(event).await
    }

    /// Publish a pre-built envelope, payload bytes untouched
    pub async fn publish_event(&self, event: Event) -> Result<Uuid> {
        validate_routing_key(&event.routing_key)?;

        let result = self.send(&event).await;

        match &result {
            Ok(()) => {
                self.metrics.record_published(&event.routing_key);
                info!(
                    routing_key = %event.routing_key,
                    message_id = %event.message_id,
                    bytes = event.payload.len(),
                    "Event published"
                );
            }
            Err(err) => {
                self.metrics.record_publish_failure(&event.routing_key);
                error!(
                    routing_key = %event.routing_key,
                    message_id = %event.message_id,
                    error = %err,
                    "Failed to publish event"
                );
            }
        }

        result.map(|()| event.message_id)
    }

    async fn send(&self, event: &Event) -> Result<()> {
        let channel = self.manager.connect().await?;
        channel.publish(&self.manager.config().exchange, event).await
    }
}
