//! Topic-routed domain events over a shared message broker
//!
//! Services publish events after committing their own writes and react to
//! other services' events through subscriptions.
//!
//! # Architecture
//!
//! ```text
//! post-service:
//!   1. Commit the post, invalidate its cache keys
//!   2. Publisher::publish("post.deleted", {postId, userId, mediaIds})
//!      ↓
//! Topic exchange `domain_events` (one per deployment)
//!      ↓  bindings: post.deleted, post.*, #
//! media-service / search-service:
//!   3. Private queue per subscription, deliveries handled in order
//!   4. Ack on handler success; retry, requeue or dead-letter on failure
//!   5. Connection lost: resubscribe through the bounded reconnect policy
//! ```
//!
//! # Example
//!
//! ```no_run
//! use event_bus::{handler_fn, BusConfig, ConnectionManager, Publisher, Subscriber};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = Arc::new(ConnectionManager::amqp(BusConfig::from_env()?).exit_on_fatal());
//!     manager.connect_or_exit().await;
//!
//!     let subscriber = Subscriber::new(manager.clone());
//!     subscriber
//!         .subscribe(
//!             "post.*",
//!             handler_fn("audit", |event| async move {
//!                 tracing::info!(routing_key = %event.routing_key, "seen");
//!                 Ok(())
//!             }),
//!         )
//!         .await?;
//!
//!     let publisher = Publisher::new(manager);
//!     publisher
//!         .publish("post.created", &serde_json::json!({"postId": "42"}))
//!         .await?;
//!     Ok(())
//! }
//! ```

#[cfg(feature = "amqp")]
pub mod amqp;
mod config;
mod error;
mod event;
mod handler;
pub mod manager;
pub mod memory;
pub mod metrics;
pub mod publisher;
pub mod subscriber;
pub mod topic;
pub mod transport;

#[cfg(feature = "amqp")]
pub use amqp::AmqpTransport;
pub use config::{BusConfig, DEFAULT_EXCHANGE};
pub use error::{BusError, HandlerError};
pub use event::{Acknowledger, Delivery, Event};
pub use handler::{handler_fn, EventHandler, FnHandler};
pub use manager::{ConnectionManager, ConnectionState, FatalHandler};
pub use memory::InMemoryBroker;
pub use metrics::{BusMetrics, ConsumeOutcome};
pub use publisher::Publisher;
pub use subscriber::{FailureAction, SubscribeOptions, Subscriber, SubscriptionHandle};
pub use transport::{BrokerChannel, DeliveryStream, Transport};

pub type Result<T> = std::result::Result<T, BusError>;
