//! Host event bus.
//!
//! Adapters publish under dotted topics (`message.group`, `message`,
//! `connect.<self_id>`, `connect`). Publishing never waits on subscribers.

use std::sync::Arc;

use {tokio::sync::broadcast, tracing::trace};

use crate::event::{HostEvent, InboundEvent};

/// Default capacity of [`BroadcastBus`]; slower subscribers observe a lag.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Sink for host events.
pub trait EventBus: Send + Sync {
    fn publish(&self, topic: &str, event: HostEvent);
}

/// An event together with the topic it was published under.
#[derive(Debug, Clone)]
pub struct Published {
    pub topic: String,
    pub event: Arc<HostEvent>,
}

/// [`EventBus`] backed by a tokio broadcast channel.
pub struct BroadcastBus {
    tx: broadcast::Sender<Published>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus for BroadcastBus {
    fn publish(&self, topic: &str, event: HostEvent) {
        let published = Published {
            topic: topic.to_string(),
            event: Arc::new(event),
        };
        if self.tx.send(published).is_err() {
            trace!(topic, "no subscribers for event");
        }
    }
}

/// Publish an inbound message under its scoped topic, then the general one.
pub fn publish_message(bus: &dyn EventBus, event: InboundEvent) {
    let scoped = format!("message.{}", event.message_type);
    let event = HostEvent::Message(event);
    bus.publish(&scoped, event.clone());
    bus.publish("message", event);
}

/// Publish a connection announcement for `self_id`.
pub fn publish_connect(bus: &dyn EventBus, self_id: &str) {
    let event = HostEvent::Connect {
        self_id: self_id.to_string(),
    };
    bus.publish(&format!("connect.{self_id}"), event.clone());
    bus.publish("connect", event);
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_is_published_scoped_then_general() {
        let bus = BroadcastBus::default();
        let mut rx = bus.subscribe();

        publish_connect(&bus, "dc_1");

        assert_eq!(rx.recv().await.unwrap().topic, "connect.dc_1");
        assert_eq!(rx.recv().await.unwrap().topic, "connect");
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = BroadcastBus::new(4);
        publish_connect(&bus, "dc_1");
    }
}
