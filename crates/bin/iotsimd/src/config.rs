//! Configuration loading: TOML file, then environment variables, then
//! command-line flags.
//!
//! Looks for `iotsim.toml` in the working directory unless `--config`
//! points elsewhere. Every field has a default so the file is optional.

use std::path::Path;

use serde::Deserialize;

use iotsim_adapter_mqtt::MqttConfig;
use iotsim_app::devices::HostIdentity;
use iotsim_app::engine::EngineConfig;
use iotsim_domain::device::DeviceKind;

/// Filter used when neither the file nor the environment sets one.
pub const DEFAULT_FILTER: &str = "iotsimd=info,iotsim=info";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker session settings.
    pub mqtt: MqttConfig,
    /// What to simulate.
    pub simulation: SimulationConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Simulated device settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Device kinds to run, by name.
    pub devices: Vec<DeviceKind>,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
    /// Location label of the temperature sensor.
    pub location: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Values given on the command line. They win over file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub seed: Option<u64>,
}

impl Config {
    /// Load `path` (if present), then apply environment and CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed,
    /// or if the merged configuration is invalid.
    pub fn load(path: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("IOTSIM_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = var("IOTSIM_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = var("IOTSIM_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.mqtt.broker_host = host;
        }
        if let Some(port) = overrides.port {
            self.mqtt.broker_port = port;
        }
        if overrides.seed.is_some() {
            self.simulation.seed = overrides.seed;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_host.trim().is_empty() {
            return Err(ConfigError::Validation("broker host must not be empty".to_string()));
        }
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.mqtt.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "connect timeout must be at least one second".to_string(),
            ));
        }
        if self.mqtt.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "channel capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Engine settings for a host with the given identity.
    #[must_use]
    pub fn engine_config(&self, identity: HostIdentity) -> EngineConfig {
        EngineConfig {
            devices: self.simulation.devices.clone(),
            identity,
            location: self.simulation.location.clone(),
            seed: self.simulation.seed,
            ..EngineConfig::default()
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            devices: DeviceKind::ALL.to_vec(),
            seed: None,
            location: "living_room".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
