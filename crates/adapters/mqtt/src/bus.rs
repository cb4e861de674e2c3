//! [`MessageBus`] over an MQTT v3.1.1 session.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use iotsim_app::ports::{BusEvent, BusEvents, MessageBus};
use iotsim_domain::connection::ConnectionState;
use iotsim_domain::error::BusError;
use iotsim_domain::message::{InboundMessage, OutboundMessage, QoS};

use crate::config::MqttConfig;
use crate::error::MqttError;

/// How long `disconnect` lets the event loop flush pending requests and the
/// DISCONNECT packet.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

struct Session {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

/// MQTT-backed message bus.
///
/// `connect` waits for the broker's CONNACK. After that a background task
/// drives the rumqttc event loop: it forwards inbound publishes, tracks the
/// session state and lets rumqttc reconnect after a transport failure.
pub struct MqttBus {
    config: MqttConfig,
    client_id: String,
    session: Mutex<Option<Session>>,
    state: Arc<watch::Sender<ConnectionState>>,
    filters: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MqttBus {
    /// Create a bus with a random `<prefix><1000..=9999>` client id.
    #[must_use]
    pub fn new(config: MqttConfig) -> Self {
        let client_id = config.client_id(&mut rand::thread_rng());
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            client_id,
            session: Mutex::new(None),
            state: Arc::new(state),
            filters: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Observe session state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn client(&self) -> Result<AsyncClient, MqttError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MqttError::Closed);
        }
        if !self.state.borrow().is_connected() {
            return Err(MqttError::NotConnected);
        }
        self.session()
            .as_ref()
            .map(|session| session.client.clone())
            .ok_or(MqttError::NotConnected)
    }

    async fn open(&self) -> Result<BusEvents, MqttError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MqttError::Closed);
        }
        let host = self.config.broker_host.clone();
        let port = self.config.broker_port;
        self.state.send_replace(ConnectionState::Connecting);
        tracing::info!(%host, port, client_id = %self.client_id, "connecting to MQTT broker");

        let mut options = MqttOptions::new(&self.client_id, &host, port);
        options.set_keep_alive(self.config.keep_alive());
        options.set_clean_session(true);
        let (client, mut eventloop) = AsyncClient::new(options, self.config.channel_capacity);

        let timeout = self.config.connect_timeout();
        let handshake = tokio::time::timeout(timeout, await_connack(&mut eventloop)).await;
        let outcome = match handshake {
            Ok(Ok(())) => Ok(()),
            Ok(Err(Handshake::Refused(code))) => Err(MqttError::Refused { host, port, code }),
            Ok(Err(Handshake::Failed(source))) => Err(MqttError::Connection { host, port, source }),
            Err(_) => Err(MqttError::Timeout {
                host,
                port,
                timeout,
            }),
        };
        if let Err(err) = outcome {
            self.state.send_replace(ConnectionState::Disconnected);
            return Err(err);
        }
        self.state.send_replace(ConnectionState::Connected);

        let (events, rx) = mpsc::unbounded_channel();
        let driver = Driver {
            eventloop,
            client: client.clone(),
            events,
            state: Arc::clone(&self.state),
            filters: Arc::clone(&self.filters),
            closed: Arc::clone(&self.closed),
            resubscribe: self.config.resubscribe_on_reconnect,
            reconnect_delay: self.config.reconnect_delay(),
        };
        let driver = tokio::spawn(driver.run());
        if let Some(previous) = self.session().replace(Session { client, driver }) {
            previous.driver.abort();
        }
        Ok(rx)
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), MqttError> {
        let client = self.client()?;
        client
            .publish(message.topic, to_rumqttc(message.qos), message.retain, message.payload)
            .await
            .map_err(MqttError::Publish)
    }

    async fn register(&self, filter: &str) -> Result<(), MqttError> {
        let client = self.client()?;
        client
            .subscribe(filter, rumqttc::QoS::AtLeastOnce)
            .await
            .map_err(MqttError::Subscribe)?;
        let mut filters = self.filters.lock().unwrap_or_else(PoisonError::into_inner);
        if !filters.iter().any(|f| f == filter) {
            filters.push(filter.to_string());
        }
        Ok(())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let session = self.session().take();
        if let Some(Session { client, mut driver }) = session {
            if let Err(err) = client.try_disconnect() {
                tracing::debug!(%err, "could not queue DISCONNECT");
            }
            if tokio::time::timeout(FLUSH_TIMEOUT, &mut driver).await.is_err() {
                driver.abort();
            }
        }
        self.state.send_replace(ConnectionState::Disconnected);
        tracing::info!("disconnected from MQTT broker");
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        if let Some(session) = self.session().take() {
            session.driver.abort();
        }
    }
}

impl MessageBus for MqttBus {
    fn connect(&self) -> impl Future<Output = Result<BusEvents, BusError>> + Send {
        async move { self.open().await.map_err(MqttError::into_domain) }
    }

    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), BusError>> + Send {
        async move { self.send(message).await.map_err(MqttError::into_domain) }
    }

    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), BusError>> + Send {
        async move { self.register(filter).await.map_err(MqttError::into_domain) }
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), BusError>> + Send {
        async move {
            self.close().await;
            Ok(())
        }
    }
}

fn to_rumqttc(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

enum Handshake {
    Refused(ConnectReturnCode),
    Failed(rumqttc::ConnectionError),
}

async fn await_connack(eventloop: &mut EventLoop) -> Result<(), Handshake> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(Handshake::Refused(code)),
                };
            }
            Ok(_) => {}
            Err(rumqttc::ConnectionError::ConnectionRefused(code)) => {
                return Err(Handshake::Refused(code));
            }
            Err(err) => return Err(Handshake::Failed(err)),
        }
    }
}

/// Owns the rumqttc event loop once the session is up.
struct Driver {
    eventloop: EventLoop,
    client: AsyncClient,
    events: mpsc::UnboundedSender<BusEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    filters: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    resubscribe: bool,
    reconnect_delay: Duration,
}

impl Driver {
    async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => self.forward(publish),
                Ok(Event::Incoming(Packet::ConnAck(_))) => self.on_reconnect(),
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => {}
                Err(_) if self.closed.load(Ordering::Acquire) => break,
                Err(err) => {
                    self.on_error(&err);
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
        tracing::debug!("MQTT event loop stopped");
    }

    fn forward(&self, publish: Publish) {
        tracing::debug!(topic = %publish.topic, bytes = publish.payload.len(), "message received");
        let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
        // The owner may have stopped listening; inbound traffic is then dropped.
        let _ = self.events.send(BusEvent::Message(message));
    }

    fn on_reconnect(&self) {
        self.state.send_replace(ConnectionState::Connected);
        tracing::info!("reconnected to MQTT broker");
        let _ = self.events.send(BusEvent::Connected);
        if !self.resubscribe {
            return;
        }
        let filters = self
            .filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for filter in filters {
            // The request channel is drained by this very loop, so never block on it.
            match self.client.try_subscribe(&filter, rumqttc::QoS::AtLeastOnce) {
                Ok(()) => tracing::info!(%filter, "resubscribed"),
                Err(err) => tracing::warn!(%filter, %err, "failed to resubscribe"),
            }
        }
    }

    fn on_error(&self, err: &rumqttc::ConnectionError) {
        let previous = self.state.send_replace(ConnectionState::Disconnected);
        if previous.is_connected() {
            tracing::warn!(%err, "connection to MQTT broker lost");
            let _ = self.events.send(BusEvent::Disconnected {
                reason: err.to_string(),
            });
        } else {
            tracing::debug!(%err, "reconnect attempt failed");
        }
    }
}
