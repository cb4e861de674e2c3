//! Commands addressed to devices and the acknowledgments sent back.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::time::Timestamp;

/// Body of a command: either a structured mapping or a bare action string.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandPayload {
    /// Payload was a JSON object.
    Structured(Map<String, Value>),
    /// Payload was opaque text, treated as `{"action": <text>}`.
    Action(String),
}

impl CommandPayload {
    /// Parse a raw payload.
    ///
    /// A payload starting with `{` must be a valid JSON object; anything
    /// else is kept verbatim as an action.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Utf8`] for non UTF-8 payloads and
    /// [`ParseError::Structured`] for a malformed object.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(raw)?;
        if text.starts_with('{') {
            serde_json::from_str::<Map<String, Value>>(text)
                .map(Self::Structured)
                .map_err(ParseError::Structured)
        } else {
            Ok(Self::Action(text.to_string()))
        }
    }

    /// The `action` field, if any.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::Structured(map) => map.get("action").and_then(Value::as_str),
            Self::Action(action) => Some(action),
        }
    }

    /// Any other field of a structured payload.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Structured(map) => map.get(name),
            Self::Action(_) => None,
        }
    }
}

impl Serialize for CommandPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Structured(map) => map.serialize(serializer),
            Self::Action(action) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("action", action)?;
                map.end()
            }
        }
    }
}

/// A command targeting exactly one device identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// The `<device>` level of `home/<device>/command`.
    pub device_id: String,
    pub payload: CommandPayload,
}

impl Command {
    /// Parse the payload of a command addressed to `device_id`.
    ///
    /// # Errors
    ///
    /// See [`CommandPayload::parse`].
    pub fn parse(device_id: impl Into<String>, raw: &[u8]) -> Result<Self, ParseError> {
        Ok(Self {
            device_id: device_id.into(),
            payload: CommandPayload::parse(raw)?,
        })
    }

    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.payload.action()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.field(name)
    }
}

/// Outcome reported in an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Executed,
}

/// Acknowledgment published on `home/<device>/status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandAck {
    pub device: String,
    pub command: CommandPayload,
    pub status: AckStatus,
    pub timestamp: Timestamp,
}

impl CommandAck {
    /// Acknowledge `command` as executed at `timestamp`.
    #[must_use]
    pub fn executed(command: Command, timestamp: Timestamp) -> Self {
        Self {
            device: command.device_id,
            command: command.payload,
            status: AckStatus::Executed,
            timestamp,
        }
    }
}
