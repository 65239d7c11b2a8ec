use std::sync::Arc;

use log::info;

use crate::config::{DriverKind, GpioConfig, PinMode};
use crate::error::GpioError;

#[cfg(feature = "hardware-gpio")]
pub mod cdev;
pub mod cli;
pub mod mock;
#[cfg(feature = "raspberry-gpio")]
pub mod raspberry;

#[cfg(feature = "hardware-gpio")]
pub use cdev::CdevDriver;
pub use cli::CliDriver;
pub use mock::{MockDriver, WriteRecord};
#[cfg(feature = "raspberry-gpio")]
pub use raspberry::RaspberryDriver;

/// Raw hardware access, electrical levels only. Logical On/Off lives above
/// this trait; nothing here knows about the active-low convention.
pub trait GpioDriver: Send + Sync {
    fn name(&self) -> &'static str;

    fn read_level(&self, pin: u8) -> Result<bool, GpioError>;

    fn write_level(&self, pin: u8, mode: PinMode, high: bool) -> Result<(), GpioError>;

    fn physical_pin(&self, pin: u8) -> Result<u8, GpioError> {
        bcm_to_physical(pin).ok_or(GpioError::InvalidPin(pin))
    }
}

/// BCM number to physical position on the 40-pin J8 header.
pub fn bcm_to_physical(pin: u8) -> Option<u8> {
    let physical = match pin {
        0 => 27,
        1 => 28,
        2 => 3,
        3 => 5,
        4 => 7,
        5 => 29,
        6 => 31,
        7 => 26,
        8 => 24,
        9 => 21,
        10 => 19,
        11 => 23,
        12 => 32,
        13 => 33,
        14 => 8,
        15 => 10,
        16 => 36,
        17 => 11,
        18 => 12,
        19 => 35,
        20 => 38,
        21 => 40,
        22 => 15,
        23 => 16,
        24 => 18,
        25 => 22,
        26 => 37,
        27 => 13,
        _ => return None,
    };
    Some(physical)
}

/// Opens the backend selected in the config. Exactly one variant is active
/// per process; an unsupported or missing backend fails here rather than
/// degrading into a driver that drops writes.
pub fn open_driver(config: &GpioConfig) -> Result<Arc<dyn GpioDriver>, GpioError> {
    let driver: Arc<dyn GpioDriver> = match config.driver {
        DriverKind::Mock => Arc::new(MockDriver::default()),
        DriverKind::Cli => Arc::new(CliDriver::probe()?),
        DriverKind::CharacterDevice => {
            #[cfg(feature = "hardware-gpio")]
            {
                Arc::new(CdevDriver::open(&config.gpio_chip)?)
            }
            #[cfg(not(feature = "hardware-gpio"))]
            {
                return Err(GpioError::DriverUnavailable(
                    "built without the hardware-gpio feature".into(),
                ));
            }
        }
        DriverKind::Raspberry => {
            #[cfg(feature = "raspberry-gpio")]
            {
                Arc::new(RaspberryDriver::open()?)
            }
            #[cfg(not(feature = "raspberry-gpio"))]
            {
                return Err(GpioError::DriverUnavailable(
                    "built without the raspberry-gpio feature".into(),
                ));
            }
        }
    };

    info!("Gpio driver initialized: {}", driver.name());
    Ok(driver)
}
