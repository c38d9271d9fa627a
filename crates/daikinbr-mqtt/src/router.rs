//! Topic router shared by the bus implementations
//!
//! Maps exact topics to the channels of their subscribers. Delivery never
//! blocks: a subscriber whose queue is full misses the message.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::bus::{Message, Subscription};

/// Default per-subscription queue capacity
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

pub(crate) struct TopicRouter {
    /// Map of topics to the senders of their subscriptions
    listeners: DashMap<String, Vec<mpsc::Sender<Message>>>,
    /// Channel capacity
    capacity: usize,
}

impl TopicRouter {
    pub(crate) fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            listeners: DashMap::new(),
            capacity,
        }
    }

    /// Register a new subscription for `topic`
    pub(crate) fn subscribe(&self, topic: &str) -> Subscription {
        trace!(topic, "Subscribing to topic");
        let (tx, rx) = mpsc::channel(self.capacity);
        self.listeners.entry(topic.to_string()).or_default().push(tx);
        Subscription::new(topic, rx)
    }

    /// Deliver a message to every live subscription of its topic
    ///
    /// Returns the number of subscriptions that received it.
    pub(crate) fn dispatch(&self, message: Message) -> usize {
        let Some(mut senders) = self.listeners.get_mut(&message.topic) else {
            trace!(topic = %message.topic, "No subscribers for topic");
            return 0;
        };

        senders.retain(|tx| !tx.is_closed());

        let mut delivered = 0;
        for tx in senders.iter() {
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(topic = %message.topic, "Subscriber queue full, dropping message")
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }

        debug!(topic = %message.topic, delivered, "Dispatched message");
        delivered
    }

    /// Topics with at least one live subscription
    pub(crate) fn topics(&self) -> Vec<String> {
        self.listeners
            .iter()
            .filter(|entry| entry.value().iter().any(|tx| !tx.is_closed()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Drop every subscription; receivers then see the end of their stream
    pub(crate) fn close(&self) {
        self.listeners.clear();
    }
}
