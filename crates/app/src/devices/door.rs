//! Door sensor: every 15–45 s one door changes position.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;

use iotsim_domain::command::Command;
use iotsim_domain::device::{Door, DoorState};
use iotsim_domain::error::CommandError;
use iotsim_domain::reading::DoorReading;
use iotsim_domain::time::Timestamp;

use crate::schedule::Schedule;

/// A simulated set of door contacts sharing one battery-powered hub.
#[derive(Debug, Clone)]
pub struct DoorSensor {
    states: BTreeMap<Door, DoorState>,
}

impl Default for DoorSensor {
    fn default() -> Self {
        Self {
            states: Door::ALL
                .into_iter()
                .map(|door| (door, DoorState::Closed))
                .collect(),
        }
    }
}

impl DoorSensor {
    pub const COMMAND_IDS: &'static [&'static str] = &["doors"];

    #[must_use]
    pub fn schedule() -> Schedule {
        Schedule::random_secs(15, 45)
    }

    #[must_use]
    pub fn state(&self, door: Door) -> DoorState {
        self.states.get(&door).copied().unwrap_or_default()
    }

    /// Flip `door` and return its new position.
    pub fn flip(&mut self, door: Door) -> DoorState {
        let state = self.states.entry(door).or_default();
        *state = state.flipped();
        *state
    }

    /// Pick a door uniformly and flip it.
    pub fn next_reading<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Timestamp) -> DoorReading {
        let door = Door::ALL.choose(rng).copied().unwrap_or(Door::Front);
        let state = self.flip(door);
        Self::reading(door, state, rng, now)
    }

    /// Apply `open`, `close` or `toggle` to the door named in the command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for unknown actions or a missing/unknown door.
    pub fn apply_command<R: Rng + ?Sized>(
        &mut self,
        command: &Command,
        rng: &mut R,
        now: Timestamp,
    ) -> Result<DoorReading, CommandError> {
        let action = command.action().ok_or(CommandError::MissingField("action"))?;
        if !matches!(action, "open" | "close" | "toggle") {
            return Err(CommandError::UnsupportedAction(action.to_string()));
        }

        let value = command.field("door").ok_or(CommandError::MissingField("door"))?;
        let door = value
            .as_str()
            .and_then(|name| name.parse::<Door>().ok())
            .ok_or_else(|| CommandError::InvalidValue {
                field: "door",
                value: value.to_string(),
            })?;

        let state = match action {
            "open" => DoorState::Open,
            "close" => DoorState::Closed,
            _ => self.state(door).flipped(),
        };
        self.states.insert(door, state);
        Ok(Self::reading(door, state, rng, now))
    }

    fn reading<R: Rng + ?Sized>(door: Door, state: DoorState, rng: &mut R, now: Timestamp) -> DoorReading {
        DoorReading {
            door,
            state,
            timestamp: now,
            battery: rng.gen_range(70..=100),
        }
    }
}
