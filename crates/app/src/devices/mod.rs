//! Simulated devices: one state machine per device kind.
//!
//! Each device owns its mutable state. Nothing outside the simulator actor
//! that holds a [`Device`] ever touches it; commands reach the state only
//! through that actor's mailbox.

mod announcer;
mod door;
mod energy;
mod light;
mod motion;
mod temperature;

pub use announcer::{Announcer, HostIdentity};
pub use door::DoorSensor;
pub use energy::EnergyMeter;
pub use light::SmartLight;
pub use motion::MotionSensor;
pub use temperature::TemperatureSensor;

use rand::Rng;

use iotsim_domain::command::Command;
use iotsim_domain::device::DeviceKind;
use iotsim_domain::error::CommandError;
use iotsim_domain::reading::DeviceReading;
use iotsim_domain::time::Timestamp;

use crate::schedule::Schedule;

/// Wrapper enum for the concrete simulated device types.
#[derive(Debug)]
pub enum Device {
    Temperature(TemperatureSensor),
    Motion(MotionSensor),
    Light(SmartLight),
    Door(DoorSensor),
    Energy(EnergyMeter),
    Announcer(Announcer),
}

impl Device {
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Temperature(_) => DeviceKind::Temperature,
            Self::Motion(_) => DeviceKind::Motion,
            Self::Light(_) => DeviceKind::Light,
            Self::Door(_) => DeviceKind::Door,
            Self::Energy(_) => DeviceKind::Energy,
            Self::Announcer(_) => DeviceKind::Announcer,
        }
    }

    /// Default scheduling policy of this device.
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        match self {
            Self::Temperature(_) => TemperatureSensor::schedule(),
            Self::Motion(_) => MotionSensor::schedule(),
            Self::Light(_) => SmartLight::schedule(),
            Self::Door(_) => DoorSensor::schedule(),
            Self::Energy(_) => EnergyMeter::schedule(),
            Self::Announcer(_) => Announcer::schedule(),
        }
    }

    /// Identifiers accepted in `home/<id>/command` for this device.
    #[must_use]
    pub fn command_ids(&self) -> &'static [&'static str] {
        match self {
            Self::Light(_) => SmartLight::COMMAND_IDS,
            Self::Door(_) => DoorSensor::COMMAND_IDS,
            _ => &[],
        }
    }

    /// Advance the simulated state by one tick and produce the reading.
    pub fn next_reading<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Timestamp) -> DeviceReading {
        match self {
            Self::Temperature(d) => DeviceReading::Temperature(d.next_reading(rng, now)),
            Self::Motion(d) => DeviceReading::Motion(d.next_reading(rng, now)),
            Self::Light(d) => DeviceReading::Light(d.next_reading(rng, now)),
            Self::Door(d) => DeviceReading::Door(d.next_reading(rng, now)),
            Self::Energy(d) => DeviceReading::Energy(d.next_reading(rng, now)),
            Self::Announcer(d) => DeviceReading::SystemStatus(d.next_reading(now)),
        }
    }

    /// Apply a command to the device state, returning the resulting reading.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the device does not accept the command;
    /// the state is left untouched in that case.
    pub fn apply_command<R: Rng + ?Sized>(
        &mut self,
        command: &Command,
        rng: &mut R,
        now: Timestamp,
    ) -> Result<DeviceReading, CommandError> {
        match self {
            Self::Light(d) => d.apply_command(command, now).map(DeviceReading::Light),
            Self::Door(d) => d.apply_command(command, rng, now).map(DeviceReading::Door),
            _ => Err(CommandError::UnsupportedAction(
                command.action().unwrap_or_default().to_string(),
            )),
        }
    }
}

/// Round `value` to `decimals` decimal places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Log a one-line human summary of a published reading.
pub(crate) fn log_published(reading: &DeviceReading) {
    match reading {
        DeviceReading::Temperature(r) => tracing::info!(
            temperature = r.temperature,
            humidity = r.humidity,
            "temperature reading published"
        ),
        DeviceReading::Motion(r) => tracing::info!(
            location = r.location,
            confidence = r.confidence,
            "motion detected"
        ),
        DeviceReading::Light(r) => tracing::info!(
            on = r.on,
            brightness = r.brightness,
            color = %r.color,
            "light state published"
        ),
        DeviceReading::Door(r) => tracing::info!(
            door = %r.door,
            state = %r.state,
            battery = r.battery,
            "door state published"
        ),
        DeviceReading::Energy(r) => tracing::info!(power = r.power, "power consumption published"),
        DeviceReading::SystemStatus(r) => tracing::info!(
            hostname = %r.hostname,
            uptime_secs = r.uptime,
            "system announcement sent"
        ),
    }
}
