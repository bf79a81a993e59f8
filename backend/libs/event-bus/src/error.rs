//! Error types for broker connectivity, publishing and consumption

use thiserror::Error;

/// Event bus errors
#[derive(Error, Debug)]
pub enum BusError {
    /// Broker unreachable or connection handshake failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Bounded reconnect policy exhausted; the owning process must terminate
    #[error("Broker connection failed after {attempts} attempts: {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },

    /// Channel closed underneath the caller
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Topology declaration (exchange, queue, binding) rejected
    #[error("Topology error: {0}")]
    Topology(String),

    /// Send failed or the broker refused the message
    #[error("Publish error: {0}")]
    Publish(String),

    /// Queue declaration, binding or consumer start failed
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// Acknowledgement could not be delivered to the broker
    #[error("Acknowledgement error: {0}")]
    Ack(String),

    /// Payload serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid routing key or binding pattern
    #[error("Invalid routing key: {0}")]
    InvalidRoutingKey(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BusError {
    /// Whether this error means the process has no event connectivity left.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BusError::ReconnectExhausted { .. })
    }
}

#[cfg(feature = "amqp")]
impl From<lapin::Error> for BusError {
    fn from(err: lapin::Error) -> Self {
        BusError::Connection(err.to_string())
    }
}

/// Failure reported by a domain event handler
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Payload could not be decoded; retrying cannot help
    #[error("failed to decode event payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Side effect failed; may succeed on retry
    #[error("handler failed: {0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        HandlerError::Failed(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Failed(_))
    }
}
