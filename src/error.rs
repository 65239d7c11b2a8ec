use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("Pin {0} is not a configured gpio pin")]
    InvalidPin(u8),
    #[error("Safe mode rejected write to non-relay pin {0}")]
    SafeModeRejection(u8),
    #[error("Hardware write failed on pin {pin}: {reason}")]
    HardwareWrite { pin: u8, reason: String },
    #[error("Hardware read failed on pin {pin}: {reason}")]
    HardwareRead { pin: u8, reason: String },
    #[error("Gpio driver unavailable: {0}")]
    DriverUnavailable(String),
    #[error("Invalid morse input: {0}")]
    InvalidMorseInput(String),
    #[error("Gpio controller is not initialized")]
    NotInitialized,
    #[error("Configuration error: {0}")]
    Config(String),
}
