pub mod config;
pub mod controller;
pub mod core;
pub mod driver;
pub mod error;
pub mod morse;
pub mod poller;
pub mod relay;
pub mod store;

pub use config::{DriverKind, EdgeDetect, GpioConfig, PinMode, PinState};
pub use controller::{PinController, authorize_pin_write};
pub use crate::core::GpioCore;
pub use driver::{GpioDriver, MockDriver, WriteRecord, bcm_to_physical, open_driver};
pub use error::GpioError;
pub use morse::{MorseCycleResult, MorseRelayTranslator};
pub use poller::{EdgeEvent, EventPoller};
pub use relay::{RelayChoreographer, RelayCycle};
pub use store::{PinConfigStore, PinEntry};
