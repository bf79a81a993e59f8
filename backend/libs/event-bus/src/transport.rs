//! Broker transport seam
//!
//! `ConnectionManager` opens channels through a [`Transport`]; publisher and
//! subscriber only ever see the [`BrokerChannel`] it hands out.

use crate::{Delivery, Event, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Stream of inbound deliveries for one queue
pub type DeliveryStream = BoxStream<'static, Result<Delivery>>;

/// Opens broker sessions
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection and a channel on it
    async fn open(&self, url: &str) -> Result<Arc<dyn BrokerChannel>>;
}

/// A logical session over one broker connection
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declare a topic exchange. Redeclaring with the same settings is a no-op.
    async fn declare_topic_exchange(&self, exchange: &str, durable: bool) -> Result<()>;

    /// Route `event` through `exchange` using its routing key
    async fn publish(&self, exchange: &str, event: &Event) -> Result<()>;

    /// Declare a server-named, exclusive, auto-deleted queue and return its name
    async fn declare_private_queue(&self) -> Result<String>;

    /// Declare a named durable queue that outlives every connection.
    /// Redeclaring an existing queue is a no-op.
    async fn declare_durable_queue(&self, queue: &str) -> Result<()>;

    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<()>;

    /// Start consuming `queue` with manual acknowledgement
    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream>;

    fn is_open(&self) -> bool;

    async fn close(&self) -> Result<()>;
}
