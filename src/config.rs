use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::GpioError;

// BCM pins usable on the 40-pin header, minus the reserved ones (i2c eeprom,
// uart console). Same whitelist the persisted configs are generated against.
pub const DEFAULT_BCM_PINS: [u8; 26] = [
    2, 3, 4, 17, 27, 22, 10, 9, 11, 5, 6, 13, 19, 26, 14, 15, 18, 23, 24, 25, 8, 7, 12, 16, 20, 21,
];

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PinMode {
    Output,
    Input,
}

/// Logical pin state. The relay boards this targets are active-low: a line
/// driven High is logically Off, Low is On. The conversion happens in
/// `from_level`/`level` and nowhere else.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PinState {
    On,
    Off,
}

impl PinState {
    pub fn from_level(high: bool) -> Self {
        if high { PinState::Off } else { PinState::On }
    }

    pub fn level(self) -> bool {
        matches!(self, PinState::Off)
    }

    pub fn flipped(self) -> Self {
        match self {
            PinState::On => PinState::Off,
            PinState::Off => PinState::On,
        }
    }
}

/// Edge filter for polling registrations. Rising means the logical Off -> On
/// transition, not the electrical one.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeDetect {
    #[default]
    None,
    Rising,
    Falling,
    Both,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DriverKind {
    #[default]
    Mock,
    Raspberry,
    CharacterDevice,
    Cli,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GpioConfig {
    #[serde(default)]
    pub driver: DriverKind,
    #[serde(default)]
    pub safe_mode: bool,
    #[serde(default = "default_true")]
    pub close_relay_on_shutdown: bool,
    #[serde(default = "default_available_pins")]
    pub available_pins: Vec<u8>,
    #[serde(default)]
    pub relay_pins: Vec<u8>,
    #[serde(default)]
    pub ir_sensor_pins: Vec<u8>,
    #[serde(default)]
    pub sound_sensor_pins: Vec<u8>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_pin_state_path")]
    pub pin_state_path: String,
    #[serde(default = "default_gpio_chip")]
    pub gpio_chip: String,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_available_pins() -> Vec<u8> {
    DEFAULT_BCM_PINS.to_vec()
}

fn default_poll_interval() -> u64 {
    1
}

fn default_pin_state_path() -> String {
    "pins.json".to_string()
}

fn default_gpio_chip() -> String {
    "/dev/gpiochip0".to_string()
}

fn default_event_capacity() -> usize {
    64
}

impl GpioConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GpioError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| GpioError::Config(format!("Failed to read config: {e}")))?;
        let config: GpioConfig = serde_json::from_str(&contents)
            .map_err(|e| GpioError::Config(format!("Invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GpioError> {
        if self.available_pins.is_empty() {
            return Err(GpioError::Config("No available pins configured".into()));
        }

        if let Some(pin) = self.available_pins.iter().find(|p| **p > 40) {
            return Err(GpioError::Config(format!(
                "Pin {pin} is outside the BCM 0-40 range"
            )));
        }

        for (name, set) in [
            ("relay", &self.relay_pins),
            ("ir-sensor", &self.ir_sensor_pins),
            ("sound-sensor", &self.sound_sensor_pins),
        ] {
            if let Some(pin) = set.iter().find(|p| !self.available_pins.contains(*p)) {
                return Err(GpioError::Config(format!(
                    "{name} pin {pin} is not in the available pin list"
                )));
            }
        }

        // a pin driving a relay must not double as a sensor input
        for pin in &self.relay_pins {
            if self.ir_sensor_pins.contains(pin) || self.sound_sensor_pins.contains(pin) {
                return Err(GpioError::Config(format!(
                    "Pin {pin} appears in more than one pin set"
                )));
            }
        }
        for pin in &self.ir_sensor_pins {
            if self.sound_sensor_pins.contains(pin) {
                return Err(GpioError::Config(format!(
                    "Pin {pin} appears in more than one pin set"
                )));
            }
        }

        if self.poll_interval_ms == 0 {
            return Err(GpioError::Config("poll_interval_ms must be non-zero".into()));
        }

        Ok(())
    }

    pub fn is_relay_pin(&self, pin: u8) -> bool {
        self.relay_pins.contains(&pin)
    }
}
