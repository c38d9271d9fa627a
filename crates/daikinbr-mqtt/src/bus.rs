//! The publish/subscribe seam

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Errors raised by a message bus
#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid broker address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to connect to broker: {0}")]
    Connect(String),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("bus is closed")]
    Closed,
}

/// A message received from the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Message {
    /// Payload as text, lossily decoded
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Messages delivered for one subscribed topic
pub struct Subscription {
    topic: String,
    rx: mpsc::Receiver<Message>,
}

impl Subscription {
    pub(crate) fn new(topic: impl Into<String>, rx: mpsc::Receiver<Message>) -> Self {
        Self {
            topic: topic.into(),
            rx,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message, or `None` once the bus has gone away
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Next queued message, without waiting
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

/// A publish/subscribe message bus
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload, optionally retained by the broker
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> BusResult<()>;

    /// Subscribe to an exact topic
    async fn subscribe(&self, topic: &str) -> BusResult<Subscription>;

    /// Close the connection, flushing queued messages where possible
    async fn disconnect(&self) -> BusResult<()>;
}
