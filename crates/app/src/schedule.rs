//! Scheduling policy: when a simulator wakes up and whether it emits.
//!
//! Policies are plain values so tests can swap them out and drive them with
//! a seeded RNG and paused tokio time.

use std::time::Duration;

use rand::Rng;

/// How long a simulator waits between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Always the same period.
    Fixed(Duration),
    /// Whole seconds drawn uniformly from `min..=max`.
    UniformSecs { min: u64, max: u64 },
}

impl Cadence {
    /// Draw the next wait.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            Self::Fixed(period) => period,
            Self::UniformSecs { min, max } => {
                let (low, high) = if min <= max { (min, max) } else { (max, min) };
                Duration::from_secs(rng.gen_range(low..=high))
            }
        }
    }
}

/// Whether the first tick happens right away or after one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstTick {
    Immediate,
    AfterDelay,
}

/// Complete scheduling policy of one simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    pub cadence: Cadence,
    /// Probability in `[0, 1]` that a tick produces a reading.
    pub emit_probability: f64,
    pub first_tick: FirstTick,
}

impl Schedule {
    /// Emit on every tick of a fixed period, starting immediately.
    #[must_use]
    pub fn every(period: Duration) -> Self {
        Self {
            cadence: Cadence::Fixed(period),
            emit_probability: 1.0,
            first_tick: FirstTick::Immediate,
        }
    }

    /// Wait a uniformly random number of seconds before every tick.
    #[must_use]
    pub fn random_secs(min: u64, max: u64) -> Self {
        Self {
            cadence: Cadence::UniformSecs { min, max },
            emit_probability: 1.0,
            first_tick: FirstTick::AfterDelay,
        }
    }

    /// Only emit on a fraction of ticks. Clamped to `[0, 1]`.
    #[must_use]
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.emit_probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self
    }

    #[must_use]
    pub fn with_first_tick(mut self, first_tick: FirstTick) -> Self {
        self.first_tick = first_tick;
        self
    }

    /// Wait before tick number `tick` (zero-based).
    pub fn delay_before<R: Rng + ?Sized>(&self, tick: u64, rng: &mut R) -> Duration {
        if tick == 0 && self.first_tick == FirstTick::Immediate {
            Duration::ZERO
        } else {
            self.cadence.next_delay(rng)
        }
    }

    /// Bernoulli draw deciding whether this tick emits.
    pub fn should_emit<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.emit_probability >= 1.0 || rng.gen_bool(self.emit_probability)
    }
}
