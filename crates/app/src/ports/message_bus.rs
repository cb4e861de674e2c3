//! Message-bus port: connect, publish and subscribe on the pub/sub fabric.

use std::future::Future;

use tokio::sync::mpsc;

use iotsim_domain::connection::ConnectionState;
use iotsim_domain::error::BusError;
use iotsim_domain::message::{InboundMessage, OutboundMessage};

/// Something the bus reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// A message arrived on a subscribed topic.
    Message(InboundMessage),
    /// The session was (re-)established.
    Connected,
    /// The session was lost unexpectedly. The transport reconnects on its own.
    Disconnected { reason: String },
}

/// Inbound events, in transport arrival order.
pub type BusEvents = mpsc::UnboundedReceiver<BusEvent>;

/// Abstraction over the external pub/sub service.
///
/// Implementations must accept concurrent `publish` calls from many tasks.
/// Reconnection policy belongs to the implementation; the engine only
/// observes [`BusEvent::Connected`] / [`BusEvent::Disconnected`].
pub trait MessageBus: Send + Sync {
    /// Establish the session and start inbound delivery.
    ///
    /// Resolves once the broker accepted the session. The returned
    /// receiver yields every [`BusEvent`] from then on.
    fn connect(&self) -> impl Future<Output = Result<BusEvents, BusError>> + Send;

    /// Publish a message.
    ///
    /// Fails fast with [`BusError::NotConnected`] while disconnected
    /// instead of queuing.
    fn publish(&self, message: OutboundMessage)
    -> impl Future<Output = Result<(), BusError>> + Send;

    /// Register interest in a topic filter (`+` / `#` evaluated by the broker).
    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Current session state.
    fn state(&self) -> ConnectionState;

    /// Graceful teardown. Calling it more than once is a no-op.
    fn disconnect(&self) -> impl Future<Output = Result<(), BusError>> + Send;
}

impl<T: MessageBus> MessageBus for std::sync::Arc<T> {
    fn connect(&self) -> impl Future<Output = Result<BusEvents, BusError>> + Send {
        (**self).connect()
    }

    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), BusError>> + Send {
        (**self).publish(message)
    }

    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), BusError>> + Send {
        (**self).subscribe(filter)
    }

    fn state(&self) -> ConnectionState {
        (**self).state()
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), BusError>> + Send {
        (**self).disconnect()
    }
}
