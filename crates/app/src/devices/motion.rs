//! Motion sensor: wakes every 10–30 s, detects motion 30 % of the time.

use rand::Rng;
use rand::seq::SliceRandom;

use iotsim_domain::reading::MotionReading;
use iotsim_domain::time::Timestamp;

use super::round_to;
use crate::schedule::Schedule;

const LOCATIONS: [&str; 3] = ["entrance", "hallway", "garage"];

/// A simulated motion sensor. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionSensor;

impl MotionSensor {
    #[must_use]
    pub fn schedule() -> Schedule {
        Schedule::random_secs(10, 30).with_probability(0.3)
    }

    pub fn next_reading<R: Rng + ?Sized>(self, rng: &mut R, now: Timestamp) -> MotionReading {
        let location = LOCATIONS.choose(rng).copied().unwrap_or(LOCATIONS[0]);
        MotionReading {
            motion: true,
            location,
            timestamp: now,
            confidence: round_to(rng.gen_range(0.7..=1.0), 2),
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
            let reading = MotionSensor.next_reading(&mut rng, now());
            prop_assert!(reading.motion);
            prop_assert!((0.7..=1.0).contains(&reading.confidence));
            prop_assert!(LOCATIONS.contains(&reading.location));
        }
    }

    #[test]
    fn should_emit_thirty_percent_of_ticks() {
        let schedule = MotionSensor::schedule();
        assert!((schedule.emit_probability - 0.3).abs() < f64::EPSILON);
    }
}
