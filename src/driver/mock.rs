use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::config::{PinMode, PinState};
use crate::error::GpioError;

use super::GpioDriver;

/// One successful hardware write, in logical terms. Tests assert choreography
/// and idempotence against this log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub pin: u8,
    pub mode: PinMode,
    pub state: PinState,
}

struct MockPin {
    level: bool,
    script: VecDeque<bool>,
}

impl Default for MockPin {
    fn default() -> Self {
        Self {
            // resting high: relays are active-low, so an untouched pin is Off
            level: true,
            script: VecDeque::new(),
        }
    }
}

#[derive(Default)]
pub struct MockDriver {
    pins: Mutex<FxHashMap<u8, MockPin>>, // keyed by bcm pin
    writes: Mutex<Vec<WriteRecord>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MockDriver {
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Queues logical states to be returned by successive reads of `pin`.
    /// Once the script runs dry the last value keeps repeating.
    pub fn push_read_states(&self, pin: u8, states: &[PinState]) {
        let mut pins = self.pins.lock();
        let entry = pins.entry(pin).or_default();
        entry.script.extend(states.iter().map(|s| s.level()));
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    pub fn level(&self, pin: u8) -> bool {
        let mut pins = self.pins.lock();
        pins.entry(pin).or_default().level
    }
}

impl GpioDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn read_level(&self, pin: u8) -> Result<bool, GpioError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(GpioError::HardwareRead {
                pin,
                reason: "simulated read failure".into(),
            });
        }

        let mut pins = self.pins.lock();
        let entry = pins.entry(pin).or_default();
        if let Some(level) = entry.script.pop_front() {
            entry.level = level;
        }
        Ok(entry.level)
    }

    fn write_level(&self, pin: u8, mode: PinMode, high: bool) -> Result<(), GpioError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(GpioError::HardwareWrite {
                pin,
                reason: "simulated write failure".into(),
            });
        }

        self.pins.lock().entry(pin).or_default().level = high;
        self.writes.lock().push(WriteRecord {
            pin,
            mode,
            state: PinState::from_level(high),
        });
        Ok(())
    }
}
