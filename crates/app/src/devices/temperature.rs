//! Temperature/humidity sensor: fixed 5 s cadence.

use std::time::Duration;

use rand::Rng;

use iotsim_domain::reading::TemperatureReading;
use iotsim_domain::time::Timestamp;

use super::round_to;
use crate::schedule::Schedule;

const BASE_TEMPERATURE: f64 = 20.0;
const TEMPERATURE_SPREAD: f64 = 5.0;
const BASE_HUMIDITY: f64 = 50.0;
const HUMIDITY_SPREAD: f64 = 10.0;

/// A simulated temperature sensor.
#[derive(Debug, Clone)]
pub struct TemperatureSensor {
    location: String,
}

impl Default for TemperatureSensor {
    fn default() -> Self {
        Self::new("living_room")
    }
}

impl TemperatureSensor {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    #[must_use]
    pub fn schedule() -> Schedule {
        Schedule::every(Duration::from_secs(5))
    }

    pub fn next_reading<R: Rng + ?Sized>(&self, rng: &mut R, now: Timestamp) -> TemperatureReading {
        let temperature = BASE_TEMPERATURE + rng.gen_range(-TEMPERATURE_SPREAD..=TEMPERATURE_SPREAD);
        let humidity = BASE_HUMIDITY + rng.gen_range(-HUMIDITY_SPREAD..=HUMIDITY_SPREAD);
        TemperatureReading {
            temperature: round_to(temperature, 1),
            humidity: round_to(humidity, 1),
            unit: "celsius",
            timestamp: now,
            location: self.location.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iotsim_domain::time::now;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    proptest! {
        #[test]
        fn should_stay_within_bounds(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let reading = TemperatureSensor::default().next_reading(&mut rng, now());
            prop_assert!((15.0..=25.0).contains(&reading.temperature));
            prop_assert!((40.0..=60.0).contains(&reading.humidity));
            prop_assert!(((reading.temperature * 10.0).round() - reading.temperature * 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn should_report_location_and_unit() {
        let mut rng = StdRng::seed_from_u64(1);
        let reading = TemperatureSensor::new("kitchen").next_reading(&mut rng, now());
        assert_eq!(reading.location, "kitchen");
        assert_eq!(reading.unit, "celsius");
    }

    #[test]
    fn should_tick_every_five_seconds() {
        let mut rng = StdRng::seed_from_u64(1);
        let schedule = TemperatureSensor::schedule();
        assert_eq!(schedule.delay_before(1, &mut rng), Duration::from_secs(5));
    }
}
