use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, trace, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::config::{GpioConfig, PinMode, PinState};
use crate::driver::GpioDriver;
use crate::error::GpioError;
use crate::store::{PinConfigStore, PinEntry};

/// The safe-mode gate. Pure so it can be tested without a controller: a
/// write is allowed when the pin is whitelisted and, if safe mode is active,
/// is one of the pre-approved relay pins.
pub fn authorize_pin_write(
    pin: u8,
    whitelist: &FxHashSet<u8>,
    relay_pins: &[u8],
    safe_mode: bool,
) -> Result<(), GpioError> {
    if !whitelist.contains(&pin) {
        return Err(GpioError::InvalidPin(pin));
    }
    if safe_mode && !relay_pins.contains(&pin) {
        return Err(GpioError::SafeModeRejection(pin));
    }
    Ok(())
}

/// Gatekeeper for every hardware write. Absorbs the electrical inversion,
/// enforces the whitelist and safe mode, and keeps the pin store consistent
/// with what was actually written.
pub struct PinController {
    driver: Arc<dyn GpioDriver>,
    store: Arc<PinConfigStore>,
    whitelist: FxHashSet<u8>,
    relay_pins: Vec<u8>,
    safe_mode: bool,
    // serializes read-compare-write-update so choreography scripts, ad-hoc
    // writes and reversion timers cannot interleave half-applied updates
    write_gate: Mutex<()>,
    initialized: AtomicBool,
}

impl PinController {
    pub fn new(
        driver: Arc<dyn GpioDriver>,
        store: Arc<PinConfigStore>,
        config: &GpioConfig,
    ) -> Self {
        Self {
            driver,
            store,
            whitelist: config.available_pins.iter().copied().collect(),
            relay_pins: config.relay_pins.clone(),
            safe_mode: config.safe_mode,
            write_gate: Mutex::new(()),
            initialized: AtomicBool::new(true),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    /// After this, every operation short-circuits without touching hardware.
    pub fn invalidate(&self) {
        self.initialized.store(false, Ordering::Relaxed);
    }

    pub fn set_pin(&self, pin: u8, mode: PinMode, state: PinState) -> Result<(), GpioError> {
        self.write_pin(pin, mode, state, false)
    }

    /// Writes even when the stored state already matches. Used by the
    /// defensive relay sweeps, which must not trust last-known state.
    pub fn set_pin_forced(&self, pin: u8, mode: PinMode, state: PinState) -> Result<(), GpioError> {
        self.write_pin(pin, mode, state, true)
    }

    fn write_pin(
        &self,
        pin: u8,
        mode: PinMode,
        state: PinState,
        force: bool,
    ) -> Result<(), GpioError> {
        if !self.is_initialized() {
            return Err(GpioError::NotInitialized);
        }
        authorize_pin_write(pin, &self.whitelist, &self.relay_pins, self.safe_mode)?;

        let _gate = self.write_gate.lock();

        let current = self.store.get(pin);
        if !force && current.mode == mode && current.state == state {
            trace!("Pin {pin} already {state:?} ({mode:?}), skipping write");
            return Ok(());
        }

        self.driver.write_level(pin, mode, state.level())?;

        let mut entry = current;
        entry.mode = mode;
        entry.state = state;
        self.store.update(entry);

        debug!("Configured pin {pin} to {state:?} ({mode:?})");
        Ok(())
    }

    /// Sets the pin, then reverts it to the opposite state after `duration`.
    /// The reversion is a detached timer: it cannot be cancelled, and it is
    /// silently lost if the process exits before it fires.
    pub fn set_pin_with_timeout(
        self: &Arc<Self>,
        pin: u8,
        mode: PinMode,
        state: PinState,
        duration: Duration,
    ) -> Result<(), GpioError> {
        self.set_pin(pin, mode, state)?;

        let mut entry = self.store.get(pin);
        entry.pending_task = true;
        entry.task_delay_minutes = (duration.as_secs() / 60) as u32;
        self.store.update(entry);

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Err(e) = controller.set_pin(pin, mode, state.flipped()) {
                warn!("Scheduled reversion for pin {pin} failed: {e}");
            }
            let mut entry = controller.store.get(pin);
            entry.pending_task = false;
            entry.task_delay_minutes = 0;
            controller.store.update(entry);
        });

        Ok(())
    }

    /// Drives an output pin to the opposite of its last-known state.
    pub fn toggle_pin(&self, pin: u8) -> Result<(), GpioError> {
        let current = self.store.get(pin);
        self.set_pin(pin, PinMode::Output, current.state.flipped())
    }

    /// Tolerant snapshot read: unknown pins yield a default entry.
    pub fn get_pin_config(&self, pin: u8) -> PinEntry {
        self.store.get(pin)
    }

    pub fn read_pin(&self, pin: u8) -> Result<PinState, GpioError> {
        if !self.is_initialized() {
            return Err(GpioError::NotInitialized);
        }
        if !self.whitelist.contains(&pin) {
            return Err(GpioError::InvalidPin(pin));
        }
        Ok(PinState::from_level(self.driver.read_level(pin)?))
    }

    pub fn physical_pin_number(&self, pin: u8) -> Result<u8, GpioError> {
        if !self.whitelist.contains(&pin) {
            return Err(GpioError::InvalidPin(pin));
        }
        self.driver.physical_pin(pin)
    }

    pub fn relay_pins(&self) -> &[u8] {
        &self.relay_pins
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }
}
