use std::collections::hash_map::Entry;

use parking_lot::Mutex;
use rppal::gpio::{Gpio, IoPin, Level, Mode};
use rustc_hash::FxHashMap;

use crate::config::PinMode;
use crate::error::GpioError;

use super::GpioDriver;

/// Memory-mapped Raspberry Pi backend via rppal. Pin handles are acquired on
/// first use and kept for the lifetime of the driver.
pub struct RaspberryDriver {
    gpio: Gpio,
    pins: Mutex<FxHashMap<u8, IoPin>>, // keyed by bcm pin
}

impl RaspberryDriver {
    pub fn open() -> Result<Self, GpioError> {
        let gpio =
            Gpio::new().map_err(|e| GpioError::DriverUnavailable(format!("rppal init: {e}")))?;

        Ok(Self {
            gpio,
            pins: Mutex::new(FxHashMap::default()),
        })
    }
}

impl GpioDriver for RaspberryDriver {
    fn name(&self) -> &'static str {
        "raspberry"
    }

    fn read_level(&self, pin: u8) -> Result<bool, GpioError> {
        let mut pins = self.pins.lock();
        let io = match pins.entry(pin) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                let p = self.gpio.get(pin).map_err(|e| GpioError::HardwareRead {
                    pin,
                    reason: format!("acquire pin: {e}"),
                })?;
                v.insert(p.into_io(Mode::Input))
            }
        };
        Ok(io.read() == Level::High)
    }

    fn write_level(&self, pin: u8, mode: PinMode, high: bool) -> Result<(), GpioError> {
        let target = match mode {
            PinMode::Output => Mode::Output,
            PinMode::Input => Mode::Input,
        };

        let mut pins = self.pins.lock();
        let io = match pins.entry(pin) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                let p = self.gpio.get(pin).map_err(|e| GpioError::HardwareWrite {
                    pin,
                    reason: format!("acquire pin: {e}"),
                })?;
                v.insert(p.into_io(target))
            }
        };

        if io.mode() != target {
            io.set_mode(target);
        }
        if mode == PinMode::Output {
            io.write(if high { Level::High } else { Level::Low });
        }
        Ok(())
    }
}
