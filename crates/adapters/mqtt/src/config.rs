//! MQTT connection configuration.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Configuration for the MQTT session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// Client identifiers are this prefix followed by a random number.
    pub client_id_prefix: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// How long to wait for the broker's CONNACK, in seconds.
    pub connect_timeout_secs: u64,
    /// Pause between failed reconnect attempts, in seconds.
    pub reconnect_delay_secs: u64,
    /// Reissue every subscription after the session is re-established.
    pub resubscribe_on_reconnect: bool,
    /// Depth of the rumqttc request channel.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id_prefix: "iot_simulator_".to_string(),
            keep_alive_secs: 60,
            connect_timeout_secs: 10,
            reconnect_delay_secs: 5,
            resubscribe_on_reconnect: true,
            channel_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// Pick a fresh client identifier, `<prefix><1000..=9999>`.
    pub fn client_id<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        format!("{}{}", self.client_id_prefix, rng.gen_range(1000..=9999))
    }

    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
