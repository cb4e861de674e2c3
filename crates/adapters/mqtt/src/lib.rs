//! # iotsim-adapter-mqtt
//!
//! MQTT adapter: implements the `MessageBus` port of `iotsim-app` on top
//! of `rumqttc`.
//!
//! ## Responsibilities
//! - Establish the session and wait for the broker's CONNACK
//! - Publish readings, acknowledgments and chat replies with their QoS / retain flags
//! - Forward inbound publishes as `BusEvent::Message`
//! - Track disconnects and reissue subscriptions after rumqttc reconnects
//!
//! ## Dependency rule
//! Depends on `iotsim-app` (for the port) and `iotsim-domain`.

pub mod config;
pub mod error;

mod bus;

pub use bus::MqttBus;
pub use config::MqttConfig;
pub use error::MqttError;
