//! Smart light: responds to `turn_on`, `turn_off`, `toggle` and `set`.
//!
//! On its own the light flips every 8 s tick with a 20 % chance.

use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;

use iotsim_domain::command::Command;
use iotsim_domain::device::LightColor;
use iotsim_domain::error::CommandError;
use iotsim_domain::reading::LightReading;
use iotsim_domain::time::Timestamp;

use crate::schedule::Schedule;

const DEVICE_ID: &str = "light_001";
const FULL_BRIGHTNESS: u8 = 100;

/// A simulated dimmable, colored light.
#[derive(Debug, Clone, Default)]
pub struct SmartLight {
    on: bool,
    brightness: u8,
    color: LightColor,
}

impl SmartLight {
    pub const COMMAND_IDS: &'static [&'static str] = &["lights", DEVICE_ID];

    #[must_use]
    pub fn schedule() -> Schedule {
        Schedule::every(Duration::from_secs(8)).with_probability(0.2)
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.on
    }

    #[must_use]
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Flip on/off with a fresh brightness and color.
    pub fn next_reading<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Timestamp) -> LightReading {
        self.on = !self.on;
        self.brightness = if self.on {
            rng.gen_range(0..=FULL_BRIGHTNESS)
        } else {
            0
        };
        self.color = LightColor::ALL.choose(rng).copied().unwrap_or_default();
        self.snapshot(now)
    }

    /// Apply a command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for unknown actions or out-of-range values.
    pub fn apply_command(
        &mut self,
        command: &Command,
        now: Timestamp,
    ) -> Result<LightReading, CommandError> {
        let action = command.action().ok_or(CommandError::MissingField("action"))?;
        match action {
            "turn_on" | "on" => self.turn_on(),
            "turn_off" | "off" => self.turn_off(),
            "toggle" => {
                if self.on {
                    self.turn_off();
                } else {
                    self.turn_on();
                }
            }
            "set" => self.set(command)?,
            other => return Err(CommandError::UnsupportedAction(other.to_string())),
        }
        Ok(self.snapshot(now))
    }

    fn turn_on(&mut self) {
        self.on = true;
        if self.brightness == 0 {
            self.brightness = FULL_BRIGHTNESS;
        }
    }

    fn turn_off(&mut self) {
        self.on = false;
        self.brightness = 0;
    }

    fn set(&mut self, command: &Command) -> Result<(), CommandError> {
        let color = match command.field("color") {
            None => None,
            Some(value) => Some(
                value
                    .as_str()
                    .and_then(|name| name.parse::<LightColor>().ok())
                    .ok_or_else(|| CommandError::InvalidValue {
                        field: "color",
                        value: value.to_string(),
                    })?,
            ),
        };
        let brightness = match command.field("brightness") {
            None => None,
            Some(value) => Some(
                value
                    .as_u64()
                    .map(|b| u8::try_from(b.min(u64::from(FULL_BRIGHTNESS))).unwrap_or(FULL_BRIGHTNESS))
                    .ok_or_else(|| CommandError::InvalidValue {
                        field: "brightness",
                        value: value.to_string(),
                    })?,
            ),
        };

        if let Some(color) = color {
            self.color = color;
        }
        if let Some(brightness) = brightness {
            self.brightness = brightness;
            self.on = brightness > 0;
        }
        Ok(())
    }

    fn snapshot(&self, now: Timestamp) -> LightReading {
        LightReading {
            on: self.on,
            brightness: self.brightness,
            color: self.color,
            timestamp: now,
            device_id: DEVICE_ID,
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

    fn command(raw: &str) -> Command {
        Command::parse("lights", raw.as_bytes()).unwrap()
    }

    proptest! {
        #[test]
        fn should_keep_brightness_consistent_with_power(seed in any::<u64>(), ticks in 1_usize..20) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut light = SmartLight::default();
            for _ in 0..ticks {
                let reading = light.next_reading(&mut rng, now());
                prop_assert!(reading.brightness <= 100);
                if !reading.on {
                    prop_assert_eq!(reading.brightness, 0);
                }
            }
        }
    }

    #[test]
    fn should_default_to_off() {
        let light = SmartLight::default();
        assert!(!light.is_on());
        assert_eq!(light.brightness(), 0);
    }

    #[test]
    fn should_toggle_on_each_tick() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut light = SmartLight::default();
        assert!(light.next_reading(&mut rng, now()).on);
        assert!(!light.next_reading(&mut rng, now()).on);
    }

    #[test]
    fn should_turn_on_at_full_brightness_when_dark() {
        let mut light = SmartLight::default();
        let reading = light.apply_command(&command("turn_on"), now()).unwrap();
        assert!(reading.on);
        assert_eq!(reading.brightness, 100);
    }

    #[test]
    fn should_turn_off_when_command_received() {
        let mut light = SmartLight::default();
        light.apply_command(&command("turn_on"), now()).unwrap();
        let reading = light.apply_command(&command("turn_off"), now()).unwrap();
        assert!(!reading.on);
        assert_eq!(reading.brightness, 0);
    }

    #[test]
    fn should_toggle_from_off_to_on() {
        let mut light = SmartLight::default();
        assert!(light.apply_command(&command("toggle"), now()).unwrap().on);
        assert!(!light.apply_command(&command("toggle"), now()).unwrap().on);
    }

    #[test]
    fn should_set_brightness_and_color() {
        let mut light = SmartLight::default();
        let reading = light
            .apply_command(
                &command(r#"{"action":"set","brightness":40,"color":"red"}"#),
                now(),
            )
            .unwrap();
        assert!(reading.on);
        assert_eq!(reading.brightness, 40);
        assert_eq!(reading.color, LightColor::Red);
    }

    #[test]
    fn should_clamp_brightness_above_full() {
        let mut light = SmartLight::default();
        let reading = light
            .apply_command(&command(r#"{"action":"set","brightness":250}"#), now())
            .unwrap();
        assert_eq!(reading.brightness, 100);
    }

    #[test]
    fn should_reject_unknown_color_without_changing_state() {
        let mut light = SmartLight::default();
        let err = light
            .apply_command(
                &command(r#"{"action":"set","brightness":40,"color":"purple"}"#),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidValue { field: "color", .. }));
        assert!(!light.is_on());
    }

    #[test]
    fn should_reject_unknown_action() {
        let mut light = SmartLight::default();
        let err = light.apply_command(&command("dance"), now()).unwrap_err();
        assert_eq!(err, CommandError::UnsupportedAction("dance".to_string()));
    }

    #[test]
    fn should_require_action_field() {
        let mut light = SmartLight::default();
        let err = light
            .apply_command(&command(r#"{"brightness":10}"#), now())
            .unwrap_err();
        assert_eq!(err, CommandError::MissingField("action"));
    }
}
