//! Energy meter: fixed 10 s cadence.

use std::time::Duration;

use rand::Rng;

use iotsim_domain::reading::EnergyReading;
use iotsim_domain::time::Timestamp;

use super::round_to;
use crate::schedule::Schedule;

const BASE_CONSUMPTION_WATTS: i32 = 2000;
const NOMINAL_VOLTAGE: f64 = 220.0;

/// A simulated whole-home energy meter.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyMeter;

impl EnergyMeter {
    #[must_use]
    pub fn schedule() -> Schedule {
        Schedule::every(Duration::from_secs(10))
    }

    pub fn next_reading<R: Rng + ?Sized>(self, rng: &mut R, now: Timestamp) -> EnergyReading {
        let power = BASE_CONSUMPTION_WATTS + rng.gen_range(-500..=1000);
        let voltage = NOMINAL_VOLTAGE + rng.gen_range(-5.0..=5.0);
        EnergyReading {
            power,
            unit: "watts",
            voltage,
            current: f64::from(power) / voltage,
            timestamp: now,
            total_today: round_to(rng.gen_range(10.0..=30.0), 2),
        }
    }
}
