//! AMQP 0-9-1 transport (RabbitMQ) built on lapin

use crate::transport::{BrokerChannel, DeliveryStream, Transport};
use crate::{Acknowledger, BusError, Delivery, Event, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use lapin::{
    acker::Acker,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Default)]
pub struct AmqpTransport {
    publisher_confirms: bool,
}

impl AmqpTransport {
    pub fn new(publisher_confirms: bool) -> Self {
        Self { publisher_confirms }
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    async fn open(&self, url: &str) -> Result<Arc<dyn BrokerChannel>> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| BusError::Connection(format!("Failed to connect: {}", e)))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(format!("Failed to create channel: {}", e)))?;

        if self.publisher_confirms {
            channel
                .confirm_select(ConfirmSelectOptions::default())
                .await
                .map_err(|e| BusError::Connection(format!("Failed to enable confirms: {}", e)))?;
        }

        Ok(Arc::new(AmqpChannel {
            connection,
            channel,
        }))
    }
}

struct AmqpChannel {
    connection: Connection,
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn declare_topic_exchange(&self, exchange: &str, durable: bool) -> Result<()> {
        self.channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Topology(format!("Failed to declare exchange: {}", e)))
    }

    async fn publish(&self, exchange: &str, event: &Event) -> Result<()> {
        let properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE.into())
            .with_message_id(event.message_id.to_string().into())
            .with_kind(event.routing_key.clone().into())
            .with_timestamp(event.produced_at.timestamp().max(0) as u64);

        let confirmation = self
            .channel
            .basic_publish(
                exchange,
                &event.routing_key,
                BasicPublishOptions::default(),
                &event.payload,
                properties,
            )
            .await
            .map_err(|e| BusError::Publish(format!("Failed to publish: {}", e)))?
            .await
            .map_err(|e| BusError::Publish(format!("Publish confirmation failed: {}", e)))?;

        if confirmation.is_nack() {
            return Err(BusError::Publish(format!(
                "broker rejected message {}",
                event.message_id
            )));
        }

        Ok(())
    }

    async fn declare_private_queue(&self) -> Result<String> {
        let queue = self
            .channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to declare queue: {}", e)))?;

        Ok(queue.name().as_str().to_string())
    }

    async fn declare_durable_queue(&self, queue: &str) -> Result<()> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Topology(format!("Failed to declare queue '{}': {}", queue, e)))?;

        debug!(queue = %queue, "Declared durable queue");
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<()> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to bind queue: {}", e)))
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to start consumer: {}", e)))?;

        debug!(queue = %queue, consumer_tag = %consumer_tag, "AMQP consumer started");

        let stream = consumer.map(|delivery| {
            let delivery = delivery.map_err(|e| BusError::ChannelClosed(e.to_string()))?;
            Ok(from_lapin(delivery))
        });

        Ok(stream.boxed())
    }

    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn close(&self) -> Result<()> {
        if self.channel.status().connected() {
            self.channel.close(200, "closing").await?;
        }
        if self.connection.status().connected() {
            self.connection.close(200, "closing").await?;
        }
        Ok(())
    }
}

/// Rebuild the envelope from message properties; foreign publishers may omit them
fn from_lapin(delivery: lapin::message::Delivery) -> Delivery {
    let properties = &delivery.properties;

    let message_id = properties
        .message_id()
        .as_ref()
        .and_then(|id| Uuid::parse_str(id.as_str()).ok())
        .unwrap_or_else(Uuid::new_v4);

    let produced_at = (*properties.timestamp())
        .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
        .unwrap_or_else(Utc::now);

    let event = Event {
        message_id,
        routing_key: delivery.routing_key.as_str().to_string(),
        payload: delivery.data,
        produced_at,
    };

    Delivery::new(
        event,
        delivery.redelivered,
        Box::new(AmqpAcker(delivery.acker)),
    )
}

struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> Result<()> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        self.0
            .nack(BasicNackOptions {
                requeue,
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }
}
