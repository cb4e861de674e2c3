//! In-process message bus that behaves like a tiny broker.
//!
//! Used as the broker stub in tests and for offline runs. Published
//! messages are recorded, fanned out to taps, and looped back as inbound
//! messages when they match one of the bus's own subscriptions.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc, watch};

use iotsim_domain::connection::ConnectionState;
use iotsim_domain::error::BusError;
use iotsim_domain::message::{InboundMessage, OutboundMessage};
use iotsim_domain::topic;

use crate::ports::{BusEvent, BusEvents, MessageBus};

#[derive(Default)]
struct Inner {
    subscriptions: Vec<String>,
    published: Vec<OutboundMessage>,
    events: Option<mpsc::UnboundedSender<BusEvent>>,
    closed: bool,
}

/// In-memory [`MessageBus`].
pub struct InMemoryBus {
    inner: Mutex<Inner>,
    state: watch::Sender<ConnectionState>,
    tap: broadcast::Sender<OutboundMessage>,
    connect_failure: Option<String>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl InMemoryBus {
    /// Create a bus whose taps buffer up to `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tap, _) = broadcast::channel(capacity);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Mutex::new(Inner::default()),
            state,
            tap,
            connect_failure: None,
        }
    }

    /// Create a bus that refuses every connection attempt with `reason`.
    #[must_use]
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            connect_failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Receive every message published *after* this call.
    #[must_use]
    pub fn tap(&self) -> broadcast::Receiver<OutboundMessage> {
        self.tap.subscribe()
    }

    /// Everything published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.lock().published.clone()
    }

    /// Everything published so far on exactly `topic`.
    #[must_use]
    pub fn published_on(&self, topic: &str) -> Vec<OutboundMessage> {
        self.lock()
            .published
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Filters registered so far.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.lock().subscriptions.clone()
    }

    /// Deliver a message from "another client" if it matches a subscription.
    ///
    /// Returns whether the message was delivered.
    pub fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
        let inner = self.lock();
        Self::deliver(&inner, InboundMessage::new(topic, payload))
    }

    /// Simulate an unexpected loss of the session.
    pub fn drop_connection(&self, reason: impl Into<String>) {
        let inner = self.lock();
        self.state.send_replace(ConnectionState::Disconnected);
        if let Some(events) = &inner.events {
            let _ = events.send(BusEvent::Disconnected {
                reason: reason.into(),
            });
        }
    }

    /// Simulate the transport re-establishing the session.
    pub fn restore_connection(&self) {
        let inner = self.lock();
        if inner.closed {
            return;
        }
        self.state.send_replace(ConnectionState::Connected);
        if let Some(events) = &inner.events {
            let _ = events.send(BusEvent::Connected);
        }
    }

    fn deliver(inner: &Inner, message: InboundMessage) -> bool {
        let matched = inner
            .subscriptions
            .iter()
            .any(|filter| topic::matches(filter, &message.topic));
        match (&inner.events, matched) {
            (Some(events), true) => events.send(BusEvent::Message(message)).is_ok(),
            _ => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_publish(&self, message: OutboundMessage) -> Result<(), BusError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(BusError::Closed);
        }
        if !self.state.borrow().is_connected() {
            return Err(BusError::NotConnected);
        }

        inner.published.push(message.clone());
        // broadcast::send fails only when there are zero taps, which is fine.
        let _ = self.tap.send(message.clone());
        Self::deliver(
            &inner,
            InboundMessage::new(message.topic.clone(), message.payload),
        );
        Ok(())
    }

    fn try_subscribe(&self, filter: &str) -> Result<(), BusError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(BusError::Closed);
        }
        if !self.state.borrow().is_connected() {
            return Err(BusError::NotConnected);
        }
        if !inner.subscriptions.iter().any(|f| f == filter) {
            inner.subscriptions.push(filter.to_string());
        }
        Ok(())
    }

    fn try_connect(&self) -> Result<BusEvents, BusError> {
        if let Some(reason) = &self.connect_failure {
            return Err(BusError::Connect {
                host: "in-memory".to_string(),
                port: 0,
                reason: reason.clone(),
            });
        }
        let mut inner = self.lock();
        if inner.closed {
            return Err(BusError::Closed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.events = Some(tx);
        self.state.send_replace(ConnectionState::Connected);
        Ok(rx)
    }
}

impl MessageBus for InMemoryBus {
    fn connect(&self) -> impl Future<Output = Result<BusEvents, BusError>> + Send {
        let result = self.try_connect();
        async { result }
    }

    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), BusError>> + Send {
        let result = self.try_publish(message);
        async { result }
    }

    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), BusError>> + Send {
        let result = self.try_subscribe(filter);
        async { result }
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), BusError>> + Send {
        let mut inner = self.lock();
        inner.closed = true;
        // Dropping the sender ends the inbound sequence.
        inner.events = None;
        self.state.send_replace(ConnectionState::Disconnected);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iotsim_domain::message::QoS;

    async fn connected() -> (InMemoryBus, BusEvents) {
        let bus = InMemoryBus::default();
        let events = bus.connect().await.unwrap();
        (bus, events)
    }

    #[tokio::test]
    async fn should_record_published_messages() {
        let (bus, _events) = connected().await;
        bus.publish(OutboundMessage::new("a/b", "x", QoS::AtLeastOnce))
            .await
            .unwrap();
        assert_eq!(bus.published_on("a/b").len(), 1);
    }

    #[tokio::test]
    async fn should_fail_fast_when_not_connected() {
        let bus = InMemoryBus::default();
        let result = bus
            .publish(OutboundMessage::new("a/b", "x", QoS::AtMostOnce))
            .await;
        assert!(matches!(result, Err(BusError::NotConnected)));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn should_drop_publishes_while_connection_is_lost() {
        let (bus, mut events) = connected().await;
        bus.drop_connection("broker went away");
        assert_eq!(
            events.recv().await.unwrap(),
            BusEvent::Disconnected {
                reason: "broker went away".to_string()
            }
        );

        let result = bus
            .publish(OutboundMessage::new("a/b", "x", QoS::AtMostOnce))
            .await;
        assert!(matches!(result, Err(BusError::NotConnected)));

        bus.restore_connection();
        assert_eq!(events.recv().await.unwrap(), BusEvent::Connected);
        assert!(
            bus.publish(OutboundMessage::new("a/b", "x", QoS::AtMostOnce))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn should_loop_back_messages_matching_subscriptions() {
        let (bus, mut events) = connected().await;
        bus.subscribe("home/+/command").await.unwrap();
        bus.publish(OutboundMessage::new("home/lamp/command", "on", QoS::AtLeastOnce))
            .await
            .unwrap();

        let Some(BusEvent::Message(msg)) = events.recv().await else {
            panic!("expected an inbound message");
        };
        assert_eq!(msg.topic, "home/lamp/command");
        assert_eq!(msg.payload, b"on");
    }

    #[tokio::test]
    async fn should_only_inject_messages_matching_subscriptions() {
        let (bus, _events) = connected().await;
        bus.subscribe("mqttchat/+/+").await.unwrap();
        assert!(bus.inject("mqttchat/demo/room1", "hi"));
        assert!(!bus.inject("home/sensors/temperature", "hi"));
    }

    #[tokio::test]
    async fn should_not_register_duplicate_subscriptions() {
        let (bus, _events) = connected().await;
        bus.subscribe("a/+").await.unwrap();
        bus.subscribe("a/+").await.unwrap();
        assert_eq!(bus.subscriptions(), vec!["a/+".to_string()]);
    }

    #[tokio::test]
    async fn should_refuse_connection_when_configured() {
        let bus = InMemoryBus::refusing("connection refused");
        let result = bus.connect().await;
        assert!(matches!(result, Err(BusError::Connect { .. })));
        assert_eq!(bus.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn should_end_inbound_sequence_on_disconnect() {
        let (bus, mut events) = connected().await;
        bus.disconnect().await.unwrap();
        bus.disconnect().await.unwrap();
        assert!(events.recv().await.is_none());
        assert!(matches!(
            bus.publish(OutboundMessage::new("a", "x", QoS::AtMostOnce)).await,
            Err(BusError::Closed)
        ));
    }

    #[tokio::test]
    async fn should_deliver_published_messages_to_taps() {
        let (bus, _events) = connected().await;
        let mut tap = bus.tap();
        bus.publish(OutboundMessage::new("a", "x", QoS::AtMostOnce))
            .await
            .unwrap();
        assert_eq!(tap.recv().await.unwrap().topic, "a");
    }
}
