//! Event consumption
//!
//! Each subscription owns a private, exclusive, auto-deleted queue bound to
//! one or more patterns. Deliveries on one queue are handled strictly in
//! order by a dedicated task. A delivery is acknowledged only after its
//! handler succeeds; failures follow the subscription's [`FailureAction`].
//!
//! The queue dies with its connection. When the delivery stream ends while
//! the manager is still meant to be connected, the task reconnects through
//! [`ConnectionManager::connect`] and replays its declarations and bindings.
//! Events published while no queue was bound are not recovered.
//!
//! Dead letters land in the durable `<exchange>.dead_letter` queue, bound
//! with `#` to the dead-letter exchange of the same name.

use crate::handler::EventHandler;
use crate::manager::{ConnectionManager, ConnectionState};
use crate::metrics::{BusMetrics, ConsumeOutcome};
use crate::topic::validate_pattern;
use crate::transport::{BrokerChannel, DeliveryStream};
use crate::{BusError, Delivery, HandlerError, Result};
use futures::StreamExt;
use parking_lot::Mutex;
use resilience::{with_retry_if, RetryConfig, RetryError};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What happens to a delivery whose handler failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Acknowledge anyway; the event is considered attempted once
    Acknowledge,
    /// Return the message to the queue once, drop it if the redelivery fails too
    Requeue,
    /// Republish the unmodified event to `<exchange>.dead_letter`, then acknowledge.
    /// The durable queue of the same name keeps it for inspection.
    DeadLetter,
}

#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// In-process retries of a retryable failure before the failure action
    pub handler_retries: RetryConfig,
    pub on_failure: FailureAction,
    /// Remember this many processed message ids and skip redeliveries of them
    pub deduplicate: Option<usize>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            handler_retries: RetryConfig::fixed(2, Duration::from_millis(500)),
            on_failure: FailureAction::DeadLetter,
            deduplicate: Some(1024),
        }
    }
}

impl SubscribeOptions {
    /// Single attempt, acknowledged whatever the outcome
    pub fn ack_always() -> Self {
        Self {
            handler_retries: RetryConfig::no_retry(),
            on_failure: FailureAction::Acknowledge,
            deduplicate: None,
        }
    }

    pub fn with_failure_action(mut self, action: FailureAction) -> Self {
        self.on_failure = action;
        self
    }

    pub fn with_handler_retries(mut self, retries: RetryConfig) -> Self {
        self.handler_retries = retries;
        self
    }

    pub fn with_deduplication(mut self, capacity: Option<usize>) -> Self {
        self.deduplicate = capacity.filter(|c| *c > 0);
        self
    }
}

pub struct Subscriber {
    manager: Arc<ConnectionManager>,
    metrics: BusMetrics,
    consumers: AtomicUsize,
}

impl Subscriber {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            metrics: BusMetrics::new(),
            consumers: AtomicUsize::new(0),
        }
    }

    /// Bind a fresh private queue to `pattern` and feed it to `handler`
    pub async fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionHandle> {
        self.subscribe_with(&[pattern], handler, SubscribeOptions::default())
            .await
    }

    /// Bind one private queue to every pattern in `patterns`.
    ///
    /// A message matching several patterns is still delivered once.
    pub async fn subscribe_with(
        &self,
        patterns: &[&str],
        handler: Arc<dyn EventHandler>,
        options: SubscribeOptions,
    ) -> Result<SubscriptionHandle> {
        if patterns.is_empty() {
            return Err(BusError::Subscribe(
                "at least one binding pattern is required".to_string(),
            ));
        }
        for pattern in patterns {
            validate_pattern(pattern)?;
        }

        let channel = self.manager.connect().await?;
        let config = self.manager.config();

        let setup = QueueSetup {
            exchange: config.exchange.clone(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            dead_letter: (options.on_failure == FailureAction::DeadLetter).then(|| {
                DeadLetterRoute {
                    exchange: config.dead_letter_exchange(),
                    queue: config.dead_letter_queue(),
                }
            }),
            consumer_tag: format!(
                "{}-{}",
                config.service_name,
                self.consumers.fetch_add(1, Ordering::SeqCst)
            ),
        };
        let (queue, deliveries) = setup.apply(channel.as_ref(), handler.name()).await?;
        let queue = Arc::new(Mutex::new(queue));

        let worker = ConsumerWorker {
            manager: self.manager.clone(),
            dedupe: options.deduplicate.map(DedupeWindow::new),
            setup,
            queue: queue.clone(),
            options,
            channel,
            handler,
            metrics: self.metrics.clone(),
        };
        let task = tokio::spawn(worker.run(deliveries));

        Ok(SubscriptionHandle {
            queue,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            task,
        })
    }
}

/// A running subscription
#[derive(Debug)]
pub struct SubscriptionHandle {
    queue: Arc<Mutex<String>>,
    patterns: Vec<String>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// Broker-assigned name of the current queue; changes on resubscription
    pub fn queue(&self) -> String {
        self.queue.lock().clone()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// The consumer stopped: the manager was closed or could not reconnect
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

#[derive(Debug, Clone)]
struct DeadLetterRoute {
    exchange: String,
    queue: String,
}

/// Broker-side topology of one subscription, replayable on a fresh channel
#[derive(Debug, Clone)]
struct QueueSetup {
    exchange: String,
    patterns: Vec<String>,
    dead_letter: Option<DeadLetterRoute>,
    consumer_tag: String,
}

impl QueueSetup {
    async fn apply(
        &self,
        channel: &dyn BrokerChannel,
        handler: &str,
    ) -> Result<(String, DeliveryStream)> {
        if let Some(route) = &self.dead_letter {
            channel.declare_topic_exchange(&route.exchange, true).await?;
            channel.declare_durable_queue(&route.queue).await?;
            channel.bind_queue(&route.queue, &route.exchange, "#").await?;
        }

        let queue = channel.declare_private_queue().await?;
        for pattern in &self.patterns {
            channel.bind_queue(&queue, &self.exchange, pattern).await?;
            info!(
                queue = %queue,
                pattern = %pattern,
                handler,
                "Subscribed to event"
            );
        }

        let deliveries = channel.consume(&queue, &self.consumer_tag).await?;
        Ok((queue, deliveries))
    }
}

struct ConsumerWorker {
    manager: Arc<ConnectionManager>,
    setup: QueueSetup,
    queue: Arc<Mutex<String>>,
    channel: Arc<dyn BrokerChannel>,
    handler: Arc<dyn EventHandler>,
    options: SubscribeOptions,
    dedupe: Option<DedupeWindow>,
    metrics: BusMetrics,
}

impl ConsumerWorker {
    async fn run(mut self, mut deliveries: DeliveryStream) {
        loop {
            while let Some(next) = deliveries.next().await {
                match next {
                    Ok(delivery) => self.process(delivery).await,
                    Err(err) => {
                        let queue = self.queue.lock().clone();
                        error!(queue = %queue, error = %err, "Failed to receive delivery");
                    }
                }
            }

            match self.resubscribe().await {
                Some(next) => deliveries = next,
                None => return,
            }
        }
    }

    /// Recreate the queue and bindings after the delivery stream ended.
    ///
    /// Returns `None` when the manager was closed or reconnecting failed.
    async fn resubscribe(&mut self) -> Option<DeliveryStream> {
        let handler = self.handler.name().to_string();

        loop {
            if self.manager.state() == ConnectionState::Disconnected {
                info!(handler = %handler, "Connection closed, consumer stopped");
                return None;
            }

            let previous = self.queue.lock().clone();
            warn!(
                queue = %previous,
                handler = %handler,
                "Delivery stream ended, resubscribing"
            );

            let channel = match self.manager.connect().await {
                Ok(channel) => channel,
                Err(err) => {
                    error!(handler = %handler, error = %err, "Cannot resubscribe, consumer stopped");
                    return None;
                }
            };

            match self.setup.apply(channel.as_ref(), &handler).await {
                Ok((queue, deliveries)) => {
                    info!(
                        queue = %queue,
                        patterns = ?self.setup.patterns,
                        handler = %handler,
                        "Resubscribed after connection loss"
                    );
                    *self.queue.lock() = queue;
                    self.channel = channel;
                    return Some(deliveries);
                }
                // Lost the connection again mid-setup
                Err(err) if !channel.is_open() => {
                    warn!(handler = %handler, error = %err, "Channel closed during resubscription");
                }
                Err(err) => {
                    error!(handler = %handler, error = %err, "Resubscription failed, consumer stopped");
                    return None;
                }
            }
        }
    }

    async fn process(&mut self, delivery: Delivery) {
        let event = &delivery.event;

        if self
            .dedupe
            .as_ref()
            .is_some_and(|seen| seen.contains(&event.message_id))
        {
            debug!(
                routing_key = %event.routing_key,
                message_id = %event.message_id,
                "Skipping already processed event"
            );
            self.settle(&delivery, ConsumeOutcome::Duplicate).await;
            return;
        }

        let handler = self.handler.clone();
        let result = with_retry_if(
            &self.options.handler_retries,
            HandlerError::is_retryable,
            || handler.handle(event),
        )
        .await;

        let err = match result {
            Ok(()) => {
                if let Some(seen) = self.dedupe.as_mut() {
                    seen.insert(event.message_id);
                }
                debug!(
                    routing_key = %event.routing_key,
                    message_id = %event.message_id,
                    handler = handler.name(),
                    "Event handled"
                );
                self.settle(&delivery, ConsumeOutcome::Acked).await;
                return;
            }
            Err(err) => err,
        };

        let retryable = matches!(err, RetryError::Exhausted { .. });
        let attempts = err.attempts();
        let cause = err.into_inner();

        let outcome = match self.options.on_failure {
            FailureAction::Acknowledge => ConsumeOutcome::AckedAfterFailure,
            FailureAction::Requeue if retryable && !delivery.redelivered => {
                ConsumeOutcome::Requeued
            }
            FailureAction::Requeue => ConsumeOutcome::Dropped,
            FailureAction::DeadLetter => self.dead_letter(&delivery).await,
        };

        error!(
            routing_key = %event.routing_key,
            message_id = %event.message_id,
            handler = handler.name(),
            attempts,
            redelivered = delivery.redelivered,
            outcome = outcome.as_str(),
            error = %cause,
            "Event handler failed"
        );

        self.settle(&delivery, outcome).await;
    }

    async fn dead_letter(&self, delivery: &Delivery) -> ConsumeOutcome {
        let Some(route) = &self.setup.dead_letter else {
            return ConsumeOutcome::Requeued;
        };

        match self.channel.publish(&route.exchange, &delivery.event).await {
            Ok(()) => ConsumeOutcome::DeadLettered,
            Err(err) => {
                error!(
                    exchange = %route.exchange,
                    message_id = %delivery.event.message_id,
                    error = %err,
                    "Dead-letter publish failed, requeueing"
                );
                ConsumeOutcome::Requeued
            }
        }
    }

    async fn settle(&self, delivery: &Delivery, outcome: ConsumeOutcome) {
        let result = match outcome {
            ConsumeOutcome::Requeued => delivery.nack(true).await,
            ConsumeOutcome::Dropped => delivery.nack(false).await,
            ConsumeOutcome::Acked
            | ConsumeOutcome::Duplicate
            | ConsumeOutcome::DeadLettered
            | ConsumeOutcome::AckedAfterFailure => delivery.ack().await,
        };

        if let Err(err) = result {
            warn!(
                message_id = %delivery.event.message_id,
                outcome = outcome.as_str(),
                error = %err,
                "Failed to settle delivery"
            );
        }

        self.metrics
            .record_consumed(&delivery.event.routing_key, outcome);
    }
}

/// Bounded record of processed message ids, oldest evicted first
struct DedupeWindow {
    capacity: usize,
    order: VecDeque<Uuid>,
    seen: HashSet<Uuid>,
}

impl DedupeWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    fn contains(&self, id: &Uuid) -> bool {
        self.seen.contains(id)
    }

    fn insert(&mut self, id: Uuid) {
        if !self.seen.insert(id) {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }
}
