//! In-memory message bus
//!
//! Routes published messages straight to local subscribers and keeps the
//! retained value of every topic, the way a broker would.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::bus::{BusError, BusResult, Message, MessageBus, Subscription};
use crate::router::TopicRouter;

/// A message bus living entirely in the process
pub struct LocalBus {
    router: TopicRouter,
    /// Last retained payload per topic
    retained: DashMap<String, Vec<u8>>,
    /// Every publish, in order
    history: Mutex<Vec<Message>>,
    closed: AtomicBool,
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            router: TopicRouter::new(),
            retained: DashMap::new(),
            history: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Retained payload of a topic
    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.retained.get(topic).map(|v| v.value().clone())
    }

    /// Retained payload of a topic, as text
    pub fn retained_str(&self, topic: &str) -> Option<String> {
        self.retained(topic)
            .map(|v| String::from_utf8_lossy(&v).into_owned())
    }

    /// Every message published so far
    pub fn history(&self) -> Vec<Message> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Messages published on one topic, as text
    pub fn published(&self, topic: &str) -> Vec<String> {
        self.history()
            .into_iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload_str().into_owned())
            .collect()
    }

    /// Topics with at least one live subscription
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.router.topics()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> BusResult<()> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        if retain {
            self.retained.insert(topic.to_string(), payload.clone());
        }
        let message = Message {
            topic: topic.to_string(),
            payload,
        };
        if let Ok(mut history) = self.history.lock() {
            history.push(message.clone());
        }
        self.router.dispatch(message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BusResult<Subscription> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        Ok(self.router.subscribe(topic))
    }

    async fn disconnect(&self) -> BusResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.router.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = LocalBus::new();
        let mut sub = bus.subscribe("a/b").await.unwrap();

        bus.publish("a/b", b"hello".to_vec(), false).await.unwrap();

        let message = sub.recv().await.unwrap();
        assert_eq!(message.topic, "a/b");
        assert_eq!(message.payload_str(), "hello");
        assert_eq!(bus.retained("a/b"), None);
    }

    #[tokio::test]
    async fn test_retained_keeps_last_value() {
        let bus = LocalBus::new();
        bus.publish("state", b"1".to_vec(), true).await.unwrap();
        bus.publish("state", b"2".to_vec(), true).await.unwrap();

        assert_eq!(bus.retained_str("state").as_deref(), Some("2"));
        assert_eq!(bus.published("state"), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_disconnect_closes_bus() {
        let bus = LocalBus::new();
        let mut sub = bus.subscribe("a").await.unwrap();

        bus.disconnect().await.unwrap();

        assert!(bus.is_closed());
        assert!(sub.recv().await.is_none());
        assert!(matches!(
            bus.publish("a", Vec::new(), false).await,
            Err(BusError::Closed)
        ));
    }
}
