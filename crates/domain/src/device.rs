//! Device kinds and the small value types their state is made of.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::message::QoS;

/// One of the simulated device categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Temperature,
    Motion,
    Light,
    Door,
    Energy,
    /// Periodic system-status announcer.
    Announcer,
}

impl DeviceKind {
    /// Every kind, in start-up order.
    pub const ALL: [Self; 6] = [
        Self::Temperature,
        Self::Motion,
        Self::Light,
        Self::Door,
        Self::Energy,
        Self::Announcer,
    ];

    /// Lowercase name used in logs, config and the status announcement.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Motion => "motion",
            Self::Light => "light",
            Self::Door => "door",
            Self::Energy => "energy",
            Self::Announcer => "announcer",
        }
    }

    /// Delivery guarantee for readings of this kind.
    #[must_use]
    pub fn qos(self) -> QoS {
        match self {
            Self::Motion => QoS::ExactlyOnce,
            Self::Energy => QoS::AtMostOnce,
            Self::Temperature | Self::Light | Self::Door | Self::Announcer => QoS::AtLeastOnce,
        }
    }

    /// Whether the broker should retain the last reading of this kind.
    #[must_use]
    pub fn retain(self) -> bool {
        matches!(self, Self::Temperature | Self::Light | Self::Announcer)
    }

    /// Whether this kind simulates a physical device (the announcer does not).
    #[must_use]
    pub fn is_physical(self) -> bool {
        !matches!(self, Self::Announcer)
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string that names no known value of the target type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what} `{value}`")]
pub struct UnknownName {
    pub what: &'static str,
    pub value: String,
}

impl FromStr for DeviceKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownName {
                what: "device kind",
                value: s.to_string(),
            })
    }
}

/// One of the doors watched by the door sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Door {
    Front,
    Back,
    Garage,
}

impl Door {
    pub const ALL: [Self; 3] = [Self::Front, Self::Back, Self::Garage];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
            Self::Garage => "garage",
        }
    }
}

impl std::fmt::Display for Door {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Door {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|door| door.as_str() == s)
            .ok_or_else(|| UnknownName {
                what: "door",
                value: s.to_string(),
            })
    }
}

/// Open/closed position of a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    #[default]
    Closed,
}

impl DoorState {
    /// The opposite position.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Open => Self::Closed,
            Self::Closed => Self::Open,
        }
    }
}

impl std::fmt::Display for DoorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Named color of the smart light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightColor {
    #[default]
    White,
    Warm,
    Cool,
    Red,
    Blue,
    Green,
}

impl LightColor {
    pub const ALL: [Self; 6] = [
        Self::White,
        Self::Warm,
        Self::Cool,
        Self::Red,
        Self::Blue,
        Self::Green,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Warm => "warm",
            Self::Cool => "cool",
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
        }
    }
}

impl std::fmt::Display for LightColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightColor {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str() == s)
            .ok_or_else(|| UnknownName {
                what: "color",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_roundtrip_kind_names() {
        for kind in DeviceKind::ALL {
            assert_eq!(kind.as_str().parse::<DeviceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn should_reject_unknown_kind() {
        let err = "toaster".parse::<DeviceKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown device kind `toaster`");
    }

    #[test]
    fn should_assign_delivery_guarantees_per_kind() {
        assert_eq!(DeviceKind::Temperature.qos(), QoS::AtLeastOnce);
        assert_eq!(DeviceKind::Motion.qos(), QoS::ExactlyOnce);
        assert_eq!(DeviceKind::Light.qos(), QoS::AtLeastOnce);
        assert_eq!(DeviceKind::Door.qos(), QoS::AtLeastOnce);
        assert_eq!(DeviceKind::Energy.qos(), QoS::AtMostOnce);
        assert_eq!(DeviceKind::Announcer.qos(), QoS::AtLeastOnce);
    }

    #[test]
    fn should_retain_only_state_topics() {
        let retained: Vec<_> = DeviceKind::ALL.into_iter().filter(|k| k.retain()).collect();
        assert_eq!(
            retained,
            vec![DeviceKind::Temperature, DeviceKind::Light, DeviceKind::Announcer]
        );
    }

    #[test]
    fn should_return_to_original_state_after_two_flips() {
        for state in [DoorState::Open, DoorState::Closed] {
            assert_eq!(state.flipped().flipped(), state);
            assert_ne!(state.flipped(), state);
        }
    }

    #[test]
    fn should_parse_doors_and_colors() {
        assert_eq!("garage".parse::<Door>().unwrap(), Door::Garage);
        assert_eq!("warm".parse::<LightColor>().unwrap(), LightColor::Warm);
        assert!("window".parse::<Door>().is_err());
    }

    #[test]
    fn should_serialize_door_state_lowercase() {
        assert_eq!(serde_json::to_string(&DoorState::Open).unwrap(), "\"open\"");
    }
}
