//! In-process broker with topic-exchange semantics
//!
//! Mirrors the parts of AMQP the bus relies on: topic exchanges, exclusive
//! auto-deleted queues, durable named queues, manual ack/nack with requeue,
//! and per-queue FIFO delivery. Fault injection hooks let tests reproduce broker outages and
//! silent message loss.

use crate::topic;
use crate::transport::{BrokerChannel, DeliveryStream, Transport};
use crate::{Acknowledger, BusError, Delivery, Event, Result};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Shared in-process broker; clones refer to the same broker
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Default)]
struct BrokerInner {
    topology: Mutex<Topology>,
    failing_connects: AtomicU32,
    connect_attempts: AtomicU32,
    drop_publishes: AtomicBool,
    acks: AtomicU64,
    nacks: AtomicU64,
    next_id: AtomicU64,
}

#[derive(Default)]
struct Topology {
    /// exchange name -> durable
    exchanges: HashMap<String, bool>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    connections: HashMap<u64, Arc<AtomicBool>>,
    unroutable: u64,
}

struct QueueState {
    owner: u64,
    sender: mpsc::UnboundedSender<QueuedMessage>,
    receiver: Option<mpsc::UnboundedReceiver<QueuedMessage>>,
}

#[derive(Clone)]
struct QueuedMessage {
    event: Event,
    redelivered: bool,
}

#[derive(PartialEq)]
struct Binding {
    exchange: String,
    queue: String,
    pattern: String,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` connection attempts fail
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Connection attempts seen so far, failed ones included
    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Accept publishes without routing them, like a channel dying mid-send
    pub fn set_drop_publishes(&self, drop: bool) {
        self.inner.drop_publishes.store(drop, Ordering::SeqCst);
    }

    /// Close every open connection; their exclusive queues are deleted
    pub fn disconnect_all(&self) {
        let mut topology = self.inner.topology.lock();
        let ids: Vec<u64> = topology.connections.keys().copied().collect();
        for id in ids {
            topology.close_connection(id);
        }
    }

    pub fn acks(&self) -> u64 {
        self.inner.acks.load(Ordering::SeqCst)
    }

    pub fn nacks(&self) -> u64 {
        self.inner.nacks.load(Ordering::SeqCst)
    }

    pub fn queue_count(&self) -> usize {
        self.inner.topology.lock().queues.len()
    }

    pub fn has_exchange(&self, exchange: &str) -> bool {
        self.inner.topology.lock().exchanges.contains_key(exchange)
    }

    pub fn has_queue(&self, queue: &str) -> bool {
        self.inner.topology.lock().queues.contains_key(queue)
    }

    /// Messages that matched no binding and were discarded
    pub fn unroutable(&self) -> u64 {
        self.inner.topology.lock().unroutable
    }

    /// Drain the messages waiting in `queue`, oldest first.
    ///
    /// Returns nothing for a missing queue or one with an active consumer.
    pub fn take_queued(&self, queue: &str) -> Vec<Event> {
        let mut topology = self.inner.topology.lock();
        let Some(receiver) = topology
            .queues
            .get_mut(queue)
            .and_then(|state| state.receiver.as_mut())
        else {
            return Vec::new();
        };

        let mut events = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            events.push(message.event);
        }
        events
    }

    /// Observe messages routed through `exchange` matching `pattern`.
    ///
    /// Deliveries on a tap are settled automatically and never counted as acks.
    pub fn tap(&self, exchange: &str, pattern: &str) -> DeliveryStream {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let queue = format!("amq.tap-{}", id);
        let (sender, receiver) = mpsc::unbounded_channel::<QueuedMessage>();

        let mut topology = self.inner.topology.lock();
        topology.queues.insert(
            queue.clone(),
            QueueState {
                owner: UNOWNED,
                sender,
                receiver: None,
            },
        );
        topology.bindings.push(Binding {
            exchange: exchange.to_string(),
            queue,
            pattern: pattern.to_string(),
        });

        futures::stream::unfold(receiver, |mut receiver| async move {
            let message = receiver.recv().await?;
            let delivery = Delivery::new(message.event, message.redelivered, Box::new(TapAcker));
            Some((Ok(delivery), receiver))
        })
        .boxed()
    }
}

/// Owner of taps and durable queues; they survive `disconnect_all`
const UNOWNED: u64 = u64::MAX;

struct TapAcker;

#[async_trait]
impl Acknowledger for TapAcker {
    async fn ack(&self) -> Result<()> {
        Ok(())
    }

    async fn nack(&self, _requeue: bool) -> Result<()> {
        Ok(())
    }
}

impl Topology {
    fn close_connection(&mut self, connection_id: u64) {
        if let Some(open) = self.connections.remove(&connection_id) {
            open.store(false, Ordering::SeqCst);
        }

        let owned: Vec<String> = self
            .queues
            .iter()
            .filter(|(_, q)| q.owner == connection_id)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &owned {
            self.queues.remove(name);
        }
        self.bindings.retain(|b| !owned.contains(&b.queue));
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    async fn open(&self, url: &str) -> Result<Arc<dyn BrokerChannel>> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .inner
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(BusError::Connection(format!("broker unreachable at {}", url)));
        }

        let connection_id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let open = Arc::new(AtomicBool::new(true));
        self.inner
            .topology
            .lock()
            .connections
            .insert(connection_id, open.clone());

        debug!(connection_id, "In-memory broker connection opened");

        Ok(Arc::new(MemoryChannel {
            broker: self.inner.clone(),
            connection_id,
            open,
        }))
    }
}

struct MemoryChannel {
    broker: Arc<BrokerInner>,
    connection_id: u64,
    open: Arc<AtomicBool>,
}

impl MemoryChannel {
    fn ensure_open(&self) -> Result<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BusError::ChannelClosed(format!(
                "connection {} is closed",
                self.connection_id
            )))
        }
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn declare_topic_exchange(&self, exchange: &str, durable: bool) -> Result<()> {
        self.ensure_open()?;
        let mut topology = self.broker.topology.lock();

        match topology.exchanges.get(exchange) {
            Some(existing) if *existing != durable => Err(BusError::Topology(format!(
                "PRECONDITION_FAILED: exchange '{}' already declared with durable={}",
                exchange, existing
            ))),
            Some(_) => Ok(()),
            None => {
                topology.exchanges.insert(exchange.to_string(), durable);
                Ok(())
            }
        }
    }

    async fn publish(&self, exchange: &str, event: &Event) -> Result<()> {
        self.ensure_open()?;

        if self.broker.drop_publishes.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut topology = self.broker.topology.lock();
        if !topology.exchanges.contains_key(exchange) {
            return Err(BusError::Publish(format!(
                "NOT_FOUND: no exchange '{}'",
                exchange
            )));
        }

        let targets: BTreeSet<String> = topology
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && topic::matches(&b.pattern, &event.routing_key))
            .map(|b| b.queue.clone())
            .collect();

        if targets.is_empty() {
            topology.unroutable += 1;
            return Ok(());
        }

        for queue in targets {
            if let Some(state) = topology.queues.get(&queue) {
                let _ = state.sender.send(QueuedMessage {
                    event: event.clone(),
                    redelivered: false,
                });
            }
        }

        Ok(())
    }

    async fn declare_private_queue(&self) -> Result<String> {
        self.ensure_open()?;
        let id = self.broker.next_id.fetch_add(1, Ordering::SeqCst);
        let name = format!("amq.gen-{}", id);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.broker.topology.lock().queues.insert(
            name.clone(),
            QueueState {
                owner: self.connection_id,
                sender,
                receiver: Some(receiver),
            },
        );

        Ok(name)
    }

    async fn declare_durable_queue(&self, queue: &str) -> Result<()> {
        self.ensure_open()?;
        let mut topology = self.broker.topology.lock();

        match topology.queues.get(queue) {
            Some(existing) if existing.owner != UNOWNED => Err(BusError::Topology(format!(
                "RESOURCE_LOCKED: queue '{}' is exclusive to another connection",
                queue
            ))),
            Some(_) => Ok(()),
            None => {
                let (sender, receiver) = mpsc::unbounded_channel();
                topology.queues.insert(
                    queue.to_string(),
                    QueueState {
                        owner: UNOWNED,
                        sender,
                        receiver: Some(receiver),
                    },
                );
                Ok(())
            }
        }
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<()> {
        self.ensure_open()?;
        let mut topology = self.broker.topology.lock();

        if !topology.queues.contains_key(queue) {
            return Err(BusError::Topology(format!("NOT_FOUND: no queue '{}'", queue)));
        }
        if !topology.exchanges.contains_key(exchange) {
            return Err(BusError::Topology(format!(
                "NOT_FOUND: no exchange '{}'",
                exchange
            )));
        }

        let binding = Binding {
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            pattern: pattern.to_string(),
        };
        if !topology.bindings.contains(&binding) {
            topology.bindings.push(binding);
        }

        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream> {
        self.ensure_open()?;

        let (receiver, sender) = {
            let mut topology = self.broker.topology.lock();
            let state = topology
                .queues
                .get_mut(queue)
                .ok_or_else(|| BusError::Subscribe(format!("NOT_FOUND: no queue '{}'", queue)))?;
            let receiver = state.receiver.take().ok_or_else(|| {
                BusError::Subscribe(format!("queue '{}' already has a consumer", queue))
            })?;
            (receiver, state.sender.downgrade())
        };

        debug!(queue = %queue, consumer_tag = %consumer_tag, "In-memory consumer started");

        let state = ConsumerState {
            receiver,
            requeue_to: sender,
            broker: self.broker.clone(),
            open: self.open.clone(),
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            let message = state.receiver.recv().await?;
            if !state.open.load(Ordering::SeqCst) {
                return None;
            }

            let acker = MemoryAcker {
                broker: state.broker.clone(),
                open: state.open.clone(),
                requeue_to: state.requeue_to.clone(),
                message: message.clone(),
                settled: AtomicBool::new(false),
            };
            let delivery = Delivery::new(message.event, message.redelivered, Box::new(acker));
            Some((Ok(delivery), state))
        });

        Ok(stream.boxed())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.broker
            .topology
            .lock()
            .close_connection(self.connection_id);
        Ok(())
    }
}

struct ConsumerState {
    receiver: mpsc::UnboundedReceiver<QueuedMessage>,
    requeue_to: mpsc::WeakUnboundedSender<QueuedMessage>,
    broker: Arc<BrokerInner>,
    open: Arc<AtomicBool>,
}

struct MemoryAcker {
    broker: Arc<BrokerInner>,
    open: Arc<AtomicBool>,
    requeue_to: mpsc::WeakUnboundedSender<QueuedMessage>,
    message: QueuedMessage,
    settled: AtomicBool,
}

impl MemoryAcker {
    fn settle(&self) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(BusError::Ack("channel closed before settlement".to_string()));
        }
        if self.settled.swap(true, Ordering::SeqCst) {
            return Err(BusError::Ack("delivery already settled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<()> {
        self.settle()?;
        self.broker.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        self.settle()?;
        self.broker.nacks.fetch_add(1, Ordering::SeqCst);

        if requeue {
            if let Some(sender) = self.requeue_to.upgrade() {
                let _ = sender.send(QueuedMessage {
                    event: self.message.event.clone(),
                    redelivered: true,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn channel(broker: &InMemoryBroker) -> Arc<dyn BrokerChannel> {
        let channel = broker.open("memory://").await.unwrap();
        channel.declare_topic_exchange("events", false).await.unwrap();
        channel
    }

    #[tokio::test]
    async fn test_failing_connects_are_consumed_in_order() {
        let broker = InMemoryBroker::new();
        broker.fail_next_connects(2);

        assert!(broker.open("memory://").await.is_err());
        assert!(broker.open("memory://").await.is_err());
        assert!(broker.open("memory://").await.is_ok());
        assert_eq!(broker.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_redeclare_with_different_durability_fails() {
        let broker = InMemoryBroker::new();
        let channel = channel(&broker).await;

        assert!(channel.declare_topic_exchange("events", false).await.is_ok());
        let err = channel.declare_topic_exchange("events", true).await.unwrap_err();
        assert!(matches!(err, BusError::Topology(_)));
    }

    #[tokio::test]
    async fn test_publish_without_binding_is_lost() {
        let broker = InMemoryBroker::new();
        let channel = channel(&broker).await;

        channel
            .publish("events", &Event::new("post.created", b"{}".to_vec()))
            .await
            .unwrap();
        assert_eq!(broker.unroutable(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_bindings_deliver_once_per_queue() {
        let broker = InMemoryBroker::new();
        let channel = channel(&broker).await;
        let queue = channel.declare_private_queue().await.unwrap();
        channel.bind_queue(&queue, "events", "post.*").await.unwrap();
        channel.bind_queue(&queue, "events", "post.created").await.unwrap();
        let mut stream = channel.consume(&queue, "test-0").await.unwrap();

        channel
            .publish("events", &Event::new("post.created", b"one".to_vec()))
            .await
            .unwrap();
        channel
            .publish("events", &Event::new("post.created", b"two".to_vec()))
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.event.payload, b"one".to_vec());
        assert_eq!(second.event.payload, b"two".to_vec());
    }

    #[tokio::test]
    async fn test_nack_with_requeue_redelivers() {
        let broker = InMemoryBroker::new();
        let channel = channel(&broker).await;
        let queue = channel.declare_private_queue().await.unwrap();
        channel.bind_queue(&queue, "events", "#").await.unwrap();
        let mut stream = channel.consume(&queue, "test-0").await.unwrap();

        channel
            .publish("events", &Event::new("post.deleted", b"x".to_vec()))
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert!(!first.redelivered);
        first.nack(true).await.unwrap();
        assert!(first.ack().await.is_err());

        let second = stream.next().await.unwrap().unwrap();
        assert!(second.redelivered);
        assert_eq!(second.event.message_id, first.event.message_id);
        second.ack().await.unwrap();

        assert_eq!(broker.acks(), 1);
        assert_eq!(broker.nacks(), 1);
    }

    #[tokio::test]
    async fn test_close_deletes_exclusive_queues_and_ends_stream() {
        let broker = InMemoryBroker::new();
        let channel = channel(&broker).await;
        let queue = channel.declare_private_queue().await.unwrap();
        channel.bind_queue(&queue, "events", "#").await.unwrap();
        let mut stream = channel.consume(&queue, "test-0").await.unwrap();
        assert_eq!(broker.queue_count(), 1);

        broker.disconnect_all();

        assert!(!channel.is_open());
        assert_eq!(broker.queue_count(), 0);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_durable_queue_keeps_messages_across_disconnects() {
        let broker = InMemoryBroker::new();
        let channel = channel(&broker).await;
        channel.declare_durable_queue("events.parked").await.unwrap();
        channel.declare_durable_queue("events.parked").await.unwrap();
        channel.bind_queue("events.parked", "events", "#").await.unwrap();

        channel
            .publish("events", &Event::new("post.deleted", b"parked".to_vec()))
            .await
            .unwrap();
        broker.disconnect_all();

        assert!(broker.has_queue("events.parked"));
        assert_eq!(broker.unroutable(), 0);
        let parked = broker.take_queued("events.parked");
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].payload, b"parked".to_vec());
        assert!(broker.take_queued("events.parked").is_empty());
    }

    #[tokio::test]
    async fn test_dropped_publish_reports_success() {
        let broker = InMemoryBroker::new();
        let channel = channel(&broker).await;
        let mut tap = broker.tap("events", "#");
        broker.set_drop_publishes(true);

        channel
            .publish("events", &Event::new("post.created", b"lost".to_vec()))
            .await
            .unwrap();
        broker.set_drop_publishes(false);
        channel
            .publish("events", &Event::new("post.created", b"kept".to_vec()))
            .await
            .unwrap();

        let delivered = tap.next().await.unwrap().unwrap();
        assert_eq!(delivered.event.payload, b"kept".to_vec());
    }
}
