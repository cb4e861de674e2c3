//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into these at port
//! boundaries (see `MqttError::into_domain` in the MQTT adapter).

/// Boxed source error carried across the message-bus port.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the message-bus port.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The transport session could not be established.
    #[error("failed to connect to {host}:{port}: {reason}")]
    Connect {
        /// Broker host.
        host: String,
        /// Broker port.
        port: u16,
        /// Human-readable failure reason reported by the transport.
        reason: String,
    },

    /// A publish or subscribe was attempted while disconnected.
    #[error("message bus not connected")]
    NotConnected,

    /// The transport rejected a publish request.
    #[error("publish failed")]
    Publish(#[source] BoxError),

    /// The transport rejected a subscribe request.
    #[error("subscribe failed")]
    Subscribe(#[source] BoxError),

    /// The bus was already torn down.
    #[error("message bus closed")]
    Closed,
}

impl BusError {
    /// Whether this error only means "try again once reconnected".
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotConnected)
    }
}

/// An inbound payload could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The payload is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// The payload looks structured but is not a valid JSON object.
    #[error("malformed structured payload")]
    Structured(#[source] serde_json::Error),
}

/// A parsed command was refused by the device it targets.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    /// The device does not know this action.
    #[error("unsupported action `{0}`")]
    UnsupportedAction(String),

    /// The command lacks a field required for the action.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field is present but has an unusable value.
    #[error("invalid value for `{field}`: {value}")]
    InvalidValue {
        /// Offending field name.
        field: &'static str,
        /// Offending value, rendered as JSON.
        value: String,
    },
}
