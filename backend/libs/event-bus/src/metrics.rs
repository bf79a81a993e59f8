//! Event bus metrics for observability

use prometheus::{CounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<BusMetricsInner> = OnceLock::new();

struct BusMetricsInner {
    published: CounterVec,
    publish_failures: CounterVec,
    consumed: CounterVec,
    connect_attempts: CounterVec,
}

impl BusMetricsInner {
    fn new() -> Self {
        Self {
            published: CounterVec::new(
                Opts::new("agora_events_published_total", "Total events published"),
                &["routing_key"],
            )
            .expect("valid metric definition"),
            publish_failures: CounterVec::new(
                Opts::new(
                    "agora_events_publish_failures_total",
                    "Total publish attempts that failed",
                ),
                &["routing_key"],
            )
            .expect("valid metric definition"),
            consumed: CounterVec::new(
                Opts::new(
                    "agora_events_consumed_total",
                    "Total deliveries settled by subscribers",
                ),
                &["routing_key", "outcome"],
            )
            .expect("valid metric definition"),
            connect_attempts: CounterVec::new(
                Opts::new(
                    "agora_broker_connect_attempts_total",
                    "Total broker connection attempts",
                ),
                &["result"],
            )
            .expect("valid metric definition"),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.published.clone()))?;
        registry.register(Box::new(self.publish_failures.clone()))?;
        registry.register(Box::new(self.consumed.clone()))?;
        registry.register(Box::new(self.connect_attempts.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static BusMetricsInner {
    METRICS.get_or_init(BusMetricsInner::new)
}

/// How a subscriber settled a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Acked,
    Duplicate,
    Requeued,
    DeadLettered,
    Dropped,
    AckedAfterFailure,
}

impl ConsumeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumeOutcome::Acked => "acked",
            ConsumeOutcome::Duplicate => "duplicate",
            ConsumeOutcome::Requeued => "requeued",
            ConsumeOutcome::DeadLettered => "dead_lettered",
            ConsumeOutcome::Dropped => "dropped",
            ConsumeOutcome::AckedAfterFailure => "acked_after_failure",
        }
    }
}

/// Bus metrics wrapper
#[derive(Clone, Default)]
pub struct BusMetrics;

impl BusMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Register metrics with a Prometheus registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_published(&self, routing_key: &str) {
        get_metrics()
            .published
            .with_label_values(&[routing_key])
            .inc();
    }

    pub fn record_publish_failure(&self, routing_key: &str) {
        get_metrics()
            .publish_failures
            .with_label_values(&[routing_key])
            .inc();
    }

    pub fn record_consumed(&self, routing_key: &str, outcome: ConsumeOutcome) {
        get_metrics()
            .consumed
            .with_label_values(&[routing_key, outcome.as_str()])
            .inc();
    }

    pub fn record_connect_attempt(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        get_metrics()
            .connect_attempts
            .with_label_values(&[result])
            .inc();
    }

    pub fn published_count(&self, routing_key: &str) -> u64 {
        get_metrics()
            .published
            .with_label_values(&[routing_key])
            .get() as u64
    }
}
