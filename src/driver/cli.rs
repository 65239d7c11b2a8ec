use std::process::Command;

use log::trace;

use crate::config::PinMode;
use crate::error::GpioError;

use super::GpioDriver;

const GPIO_TOOL: &str = "raspi-gpio";

/// Fallback backend that shells out to the `raspi-gpio` utility. Slow, but
/// works anywhere the tool is installed and needs no elevated mmap access.
pub struct CliDriver {
    _private: (),
}

impl CliDriver {
    pub fn probe() -> Result<Self, GpioError> {
        match Command::new(GPIO_TOOL).arg("help").output() {
            Ok(out) if out.status.success() => Ok(Self { _private: () }),
            Ok(out) => Err(GpioError::DriverUnavailable(format!(
                "{GPIO_TOOL} exited with {}",
                out.status
            ))),
            Err(e) => Err(GpioError::DriverUnavailable(format!(
                "{GPIO_TOOL} is not runnable: {e}"
            ))),
        }
    }
}

impl GpioDriver for CliDriver {
    fn name(&self) -> &'static str {
        "cli"
    }

    fn read_level(&self, pin: u8) -> Result<bool, GpioError> {
        let out = Command::new(GPIO_TOOL)
            .args(["get", &pin.to_string()])
            .output()
            .map_err(|e| GpioError::HardwareRead {
                pin,
                reason: format!("spawn {GPIO_TOOL}: {e}"),
            })?;

        if !out.status.success() {
            return Err(GpioError::HardwareRead {
                pin,
                reason: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        // stdout looks like: "GPIO 17: level=1 fsel=1 func=OUTPUT"
        let stdout = String::from_utf8_lossy(&out.stdout);
        for token in stdout.split_whitespace() {
            if let Some(level) = token.strip_prefix("level=") {
                return Ok(level == "1");
            }
        }

        Err(GpioError::HardwareRead {
            pin,
            reason: format!("unparseable {GPIO_TOOL} output: {}", stdout.trim()),
        })
    }

    fn write_level(&self, pin: u8, mode: PinMode, high: bool) -> Result<(), GpioError> {
        let pin_arg = pin.to_string();
        let mut args = vec!["set", pin_arg.as_str()];
        match mode {
            PinMode::Output => {
                args.push("op");
                args.push(if high { "dh" } else { "dl" });
            }
            PinMode::Input => args.push("ip"),
        }

        trace!("{GPIO_TOOL} {}", args.join(" "));
        let out = Command::new(GPIO_TOOL)
            .args(&args)
            .output()
            .map_err(|e| GpioError::HardwareWrite {
                pin,
                reason: format!("spawn {GPIO_TOOL}: {e}"),
            })?;

        if !out.status.success() {
            return Err(GpioError::HardwareWrite {
                pin,
                reason: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
