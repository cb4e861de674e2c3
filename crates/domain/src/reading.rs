//! Device readings: immutable snapshots published once, then discarded.
//!
//! Field names and order match what existing subscribers expect.

use serde::Serialize;

use crate::device::{DeviceKind, Door, DoorState, LightColor};
use crate::message::{OutboundMessage, QoS};
use crate::time::Timestamp;
use crate::topic;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureReading {
    /// Degrees Celsius, one decimal.
    pub temperature: f64,
    /// Relative humidity in percent, one decimal.
    pub humidity: f64,
    pub unit: &'static str,
    pub timestamp: Timestamp,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionReading {
    pub motion: bool,
    pub location: &'static str,
    pub timestamp: Timestamp,
    /// Detection confidence in `[0.7, 1.0]`, two decimals.
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightReading {
    pub on: bool,
    pub brightness: u8,
    pub color: LightColor,
    pub timestamp: Timestamp,
    pub device_id: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoorReading {
    pub door: Door,
    pub state: DoorState,
    pub timestamp: Timestamp,
    /// Battery level in percent.
    pub battery: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyReading {
    /// Instantaneous power draw in watts.
    pub power: i32,
    pub unit: &'static str,
    pub voltage: f64,
    pub current: f64,
    pub timestamp: Timestamp,
    /// Energy consumed today in kWh, two decimals.
    pub total_today: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub system: &'static str,
    pub status: &'static str,
    pub hostname: String,
    pub ip: String,
    pub devices: Vec<DeviceKind>,
    /// Seconds since the engine started.
    pub uptime: f64,
    pub timestamp: Timestamp,
}

/// A reading produced by one of the simulated devices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeviceReading {
    Temperature(TemperatureReading),
    Motion(MotionReading),
    Light(LightReading),
    Door(DoorReading),
    Energy(EnergyReading),
    SystemStatus(SystemStatus),
}

impl DeviceReading {
    /// The device kind that produced this reading.
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Temperature(_) => DeviceKind::Temperature,
            Self::Motion(_) => DeviceKind::Motion,
            Self::Light(_) => DeviceKind::Light,
            Self::Door(_) => DeviceKind::Door,
            Self::Energy(_) => DeviceKind::Energy,
            Self::SystemStatus(_) => DeviceKind::Announcer,
        }
    }

    /// When this reading was generated.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Temperature(r) => r.timestamp,
            Self::Motion(r) => r.timestamp,
            Self::Light(r) => r.timestamp,
            Self::Door(r) => r.timestamp,
            Self::Energy(r) => r.timestamp,
            Self::SystemStatus(r) => r.timestamp,
        }
    }

    /// Topic this reading is published on.
    #[must_use]
    pub fn topic(&self) -> String {
        match self {
            Self::Temperature(_) => topic::TEMPERATURE.to_string(),
            Self::Motion(_) => topic::MOTION.to_string(),
            Self::Light(_) => topic::LIGHT.to_string(),
            Self::Door(r) => topic::door(r.door.as_str()),
            Self::Energy(_) => topic::ENERGY.to_string(),
            Self::SystemStatus(_) => topic::SYSTEM_STATUS.to_string(),
        }
    }

    #[must_use]
    pub fn qos(&self) -> QoS {
        self.kind().qos()
    }

    #[must_use]
    pub fn retain(&self) -> bool {
        self.kind().retain()
    }

    /// Serialise into the outbound message for this reading.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; readings contain no maps with
    /// non-string keys, so this does not happen in practice.
    pub fn to_message(&self) -> Result<OutboundMessage, serde_json::Error> {
        let payload = serde_json::to_vec(self)?;
        Ok(OutboundMessage::new(self.topic(), payload, self.qos()).retained(self.retain()))
    }
}
