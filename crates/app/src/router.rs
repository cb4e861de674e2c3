//! Command router: dispatches inbound messages by topic pattern.
//!
//! - `home/<device>/command` → acknowledge on `home/<device>/status`, and
//!   forward to the device's simulator when `<device>` names one
//! - `mqttchat/<room>/<id>` → after a short processing delay, reply with
//!   one canned response on `mqttchat/demo/room1`
//! - anything else → ignored
//!
//! A failure while handling one message is logged and never stops the
//! router from handling the next one.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use iotsim_domain::chat;
use iotsim_domain::command::{Command, CommandAck};
use iotsim_domain::error::{BusError, ParseError};
use iotsim_domain::message::{InboundMessage, OutboundMessage, QoS};
use iotsim_domain::time::now;
use iotsim_domain::topic;

use crate::ports::MessageBus;

/// Simulated processing time before answering a chat message.
pub const CHAT_DELAY: Duration = Duration::from_millis(500);

/// How many of our own chat replies are remembered for echo suppression.
const PENDING_ECHO_CAPACITY: usize = 32;

/// Why a routed message produced no outbound publish.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("failed to parse inbound payload")]
    Parse(#[from] ParseError),

    #[error("failed to encode acknowledgment")]
    Encode(#[source] serde_json::Error),

    #[error("failed to publish response")]
    Publish(#[from] BusError),
}

/// What the router did with a message.
#[derive(Debug)]
pub enum Routed {
    /// A command was acknowledged on `home/<device>/status`.
    Acknowledged { device: String },
    /// A chat reply was published.
    Replied { reply: String },
    /// Topic matched nothing, or the message was our own chat echo.
    Ignored,
    /// The message matched but handling failed. Already logged.
    Dropped(RouteError),
}

/// Topic-pattern dispatcher for inbound messages.
pub struct CommandRouter<B> {
    bus: B,
    devices: HashMap<String, mpsc::Sender<Command>>,
    rng: StdRng,
    chat_delay: Duration,
    pending_echoes: VecDeque<String>,
}

impl<B: MessageBus> CommandRouter<B> {
    pub fn new(bus: B, seed: u64) -> Self {
        Self {
            bus,
            devices: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
            chat_delay: CHAT_DELAY,
            pending_echoes: VecDeque::with_capacity(PENDING_ECHO_CAPACITY),
        }
    }

    #[must_use]
    pub fn with_chat_delay(mut self, delay: Duration) -> Self {
        self.chat_delay = delay;
        self
    }

    /// Forward commands for `device_id` to `mailbox` in addition to acking them.
    pub fn register(&mut self, device_id: impl Into<String>, mailbox: mpsc::Sender<Command>) {
        self.devices.insert(device_id.into(), mailbox);
    }

    /// Handle one inbound message.
    pub async fn handle(&mut self, message: InboundMessage) -> Routed {
        tracing::debug!(
            topic = %message.topic,
            payload = %message.payload_lossy(),
            "message received"
        );

        let routed = if let Some(device) = topic::command_target(&message.topic) {
            let device = device.to_string();
            self.handle_command(device, &message.payload).await
        } else if topic::chat_route(&message.topic).is_some() {
            self.handle_chat(&message).await
        } else {
            Routed::Ignored
        };

        if let Routed::Dropped(err) = &routed {
            tracing::warn!(topic = %message.topic, %err, "inbound message dropped");
        }
        routed
    }

    async fn handle_command(&mut self, device: String, payload: &[u8]) -> Routed {
        let command = match Command::parse(device.clone(), payload) {
            Ok(command) => command,
            Err(err) => return Routed::Dropped(err.into()),
        };
        tracing::info!(%device, action = command.action().unwrap_or_default(), "executing command");

        if let Some(mailbox) = self.devices.get(&device)
            && mailbox.send(command.clone()).await.is_err()
        {
            tracing::warn!(%device, "device simulator is gone, command not applied");
        }

        let ack = CommandAck::executed(command, now());
        let payload = match serde_json::to_vec(&ack) {
            Ok(payload) => payload,
            Err(err) => return Routed::Dropped(RouteError::Encode(err)),
        };
        let message = OutboundMessage::new(topic::device_status(&device), payload, QoS::AtLeastOnce);

        match self.bus.publish(message).await {
            Ok(()) => Routed::Acknowledged { device },
            Err(err) => Routed::Dropped(err.into()),
        }
    }

    async fn handle_chat(&mut self, message: &InboundMessage) -> Routed {
        let received = match std::str::from_utf8(&message.payload) {
            Ok(text) => text.to_string(),
            Err(err) => return Routed::Dropped(ParseError::Utf8(err).into()),
        };

        // Only our reply room can carry our own echo back.
        if message.topic == topic::CHAT_REPLY
            && let Some(index) = self.pending_echoes.iter().position(|r| *r == received)
        {
            self.pending_echoes.remove(index);
            tracing::debug!(topic = %message.topic, "own chat reply ignored");
            return Routed::Ignored;
        }

        tokio::time::sleep(self.chat_delay).await;

        let mut candidates = chat::candidates(&received, now());
        let index = self.rng.gen_range(0..candidates.len());
        let reply = std::mem::take(&mut candidates[index]);

        if self.pending_echoes.len() == PENDING_ECHO_CAPACITY {
            self.pending_echoes.pop_front();
        }
        self.pending_echoes.push_back(reply.clone());

        let outbound = OutboundMessage::new(topic::CHAT_REPLY, reply.clone(), QoS::AtLeastOnce);
        match self.bus.publish(outbound).await {
            Ok(()) => {
                tracing::info!(%reply, "chat response sent");
                Routed::Replied { reply }
            }
            Err(err) => {
                self.pending_echoes.pop_back();
                Routed::Dropped(err.into())
            }
        }
    }
}
