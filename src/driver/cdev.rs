use std::path::PathBuf;

use libgpiod::{chip::Chip, line, request};
use parking_lot::{FairMutex, RwLock, RwLockUpgradableReadGuard};
use rustc_hash::FxHashMap;

use crate::config::PinMode;
use crate::error::GpioError;

use super::GpioDriver;

/// Linux GPIO character-device backend. Lines are requested lazily, one
/// request per pin, and reconfigured in place when the direction changes.
pub struct CdevDriver {
    chip_path: String,
    pins: RwLock<FxHashMap<u8, FairMutex<LineHandle>>>, // keyed by bcm pin
}

struct LineHandle {
    request: request::Request,
    mode: PinMode,
}

impl CdevDriver {
    pub fn open(chip_path: &str) -> Result<Self, GpioError> {
        // probe the chip up front so an unsupported host fails at init
        Self::open_chip(chip_path)?;

        Ok(Self {
            chip_path: chip_path.to_string(),
            pins: RwLock::new(FxHashMap::default()),
        })
    }

    fn open_chip(path: &str) -> Result<Chip, GpioError> {
        let p = PathBuf::from(path);
        Chip::open(&p).map_err(|e| GpioError::DriverUnavailable(format!("open chip {path}: {e}")))
    }

    fn line_settings(mode: PinMode) -> Result<line::Settings, String> {
        let mut ls = line::Settings::new().map_err(|e| format!("line settings: {e}"))?;
        let direction = match mode {
            PinMode::Output => line::Direction::Output,
            PinMode::Input => line::Direction::Input,
        };
        ls.set_direction(direction)
            .map_err(|e| format!("set direction: {e}"))?;
        Ok(ls)
    }

    fn line_config(pin: u8, settings: line::Settings) -> Result<line::Config, String> {
        let mut cfg = line::Config::new().map_err(|e| format!("line config: {e}"))?;
        cfg.add_line_settings(&[pin as u32], settings)
            .map_err(|e| format!("line config add settings: {e}"))?;
        Ok(cfg)
    }

    fn request_line(&self, pin: u8, mode: PinMode) -> Result<LineHandle, String> {
        let chip = Self::open_chip(&self.chip_path).map_err(|e| e.to_string())?;
        let line_cfg = Self::line_config(pin, Self::line_settings(mode)?)?;

        let mut req_cfg = request::Config::new().map_err(|e| format!("request config: {e}"))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| format!("request consumer: {e}"))?;
        let request = chip
            .request_lines(Some(&req_cfg), &line_cfg)
            .map_err(|e| format!("request lines: {e}"))?;

        Ok(LineHandle { request, mode })
    }

    fn reconfigure(handle: &mut LineHandle, pin: u8, mode: PinMode) -> Result<(), String> {
        let line_cfg = Self::line_config(pin, Self::line_settings(mode)?)?;
        handle
            .request
            .reconfigure_lines(&line_cfg)
            .map_err(|e| format!("reconfigure lines: {e}"))?;
        handle.mode = mode;
        Ok(())
    }
}

impl GpioDriver for CdevDriver {
    fn name(&self) -> &'static str {
        "character-device"
    }

    fn read_level(&self, pin: u8) -> Result<bool, GpioError> {
        let wrap = |reason: String| GpioError::HardwareRead { pin, reason };

        let pins = self.pins.upgradable_read();
        if let Some(handle_lock) = pins.get(&pin) {
            let handle = handle_lock.lock();
            let value = handle
                .request
                .value(pin as u32)
                .map_err(|e| wrap(format!("get value: {e}")))?;
            return Ok(matches!(value, line::Value::Active));
        }

        // first touch of this pin: take the line as a plain input
        let handle = self.request_line(pin, PinMode::Input).map_err(wrap)?;
        let value = handle
            .request
            .value(pin as u32)
            .map_err(|e| wrap(format!("get value: {e}")))?;

        let mut pins = RwLockUpgradableReadGuard::upgrade(pins);
        pins.insert(pin, FairMutex::new(handle));
        Ok(matches!(value, line::Value::Active))
    }

    fn write_level(&self, pin: u8, mode: PinMode, high: bool) -> Result<(), GpioError> {
        let wrap = |reason: String| GpioError::HardwareWrite { pin, reason };
        let value = if high {
            line::Value::Active
        } else {
            line::Value::InActive
        };

        let pins = self.pins.upgradable_read();
        if let Some(handle_lock) = pins.get(&pin) {
            let mut handle = handle_lock.lock();
            if handle.mode != mode {
                Self::reconfigure(&mut handle, pin, mode).map_err(wrap)?;
            }
            if mode == PinMode::Output {
                handle
                    .request
                    .set_value(pin as u32, value)
                    .map_err(|e| wrap(format!("set value: {e}")))?;
            }
            return Ok(());
        }

        let handle = self.request_line(pin, mode).map_err(wrap)?;
        if mode == PinMode::Output {
            handle
                .request
                .set_value(pin as u32, value)
                .map_err(|e| wrap(format!("set value: {e}")))?;
        }

        let mut pins = RwLockUpgradableReadGuard::upgrade(pins);
        pins.insert(pin, FairMutex::new(handle));
        Ok(())
    }
}
