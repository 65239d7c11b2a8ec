use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{trace, warn};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::{EdgeDetect, PinState};
use crate::driver::GpioDriver;

/// A detected transition between two logical pin states. Ephemeral: events
/// are broadcast to subscribers and never persisted.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EdgeEvent {
    pub pin: u8,
    pub previous: PinState,
    pub current: PinState,
    pub timestamp_ms: u64,
}

impl EdgeEvent {
    pub fn edge(&self) -> EdgeDetect {
        match self.current {
            PinState::On => EdgeDetect::Rising,
            PinState::Off => EdgeDetect::Falling,
        }
    }
}

fn filter_matches(filter: EdgeDetect, current: PinState) -> bool {
    match filter {
        EdgeDetect::None => false,
        EdgeDetect::Rising => current == PinState::On,
        EdgeDetect::Falling => current == PinState::Off,
        EdgeDetect::Both => true,
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

struct PollRegistration {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for PollRegistration {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Polling-based edge detection: one lightweight thread per registered pin,
/// reading the driver at a fixed cadence and emitting an event only on an
/// actual change. A glitch shorter than the poll interval is invisible;
/// there is no sub-interval debouncing.
pub struct EventPoller {
    driver: Arc<dyn GpioDriver>,
    whitelist: FxHashSet<u8>,
    interval: Duration,
    event_tx: broadcast::Sender<EdgeEvent>,
    registrations: Mutex<FxHashMap<u8, PollRegistration>>,
}

impl EventPoller {
    pub fn new(
        driver: Arc<dyn GpioDriver>,
        whitelist: FxHashSet<u8>,
        interval: Duration,
        event_capacity: usize,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(event_capacity);

        Self {
            driver,
            whitelist,
            interval,
            event_tx,
            registrations: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EdgeEvent> {
        self.event_tx.subscribe()
    }

    /// Starts a polling loop for `pin`. At most one loop per pin: a second
    /// registration is logged and rejected, never queued.
    pub fn register(&self, pin: u8, filter: EdgeDetect) -> bool {
        if !self.whitelist.contains(&pin) {
            warn!("Cannot poll pin {pin}: not a configured gpio pin");
            return false;
        }

        let mut registrations = self.registrations.lock();
        if registrations.contains_key(&pin) {
            warn!("Pin {pin} is already being polled, ignoring registration");
            return false;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancel.clone();
        let driver = self.driver.clone();
        let event_tx = self.event_tx.clone();
        let interval = self.interval;

        let spawned = std::thread::Builder::new()
            .name(format!("gpio-poll-{pin}"))
            .spawn(move || {
                let mut previous = match driver.read_level(pin) {
                    Ok(level) => PinState::from_level(level),
                    Err(e) => {
                        warn!("Initial read of pin {pin} failed ({e}), assuming Off");
                        PinState::Off
                    }
                };
                trace!("Started polling pin {pin}");

                while !cancel_flag.load(Ordering::Relaxed) {
                    std::thread::sleep(interval);

                    // a failed read is treated as "no transition this tick"
                    // so a transient driver hiccup cannot kill the loop
                    let current = match driver.read_level(pin) {
                        Ok(level) => PinState::from_level(level),
                        Err(_) => continue,
                    };

                    if current != previous {
                        if filter_matches(filter, current) {
                            let _ = event_tx.send(EdgeEvent {
                                pin,
                                previous,
                                current,
                                timestamp_ms: epoch_millis(),
                            });
                        }
                        previous = current;
                    }
                }

                trace!("Polling for pin {pin} has been stopped");
            });

        match spawned {
            Ok(handle) => {
                registrations.insert(
                    pin,
                    PollRegistration {
                        cancel,
                        handle: Some(handle),
                    },
                );
                true
            }
            Err(e) => {
                warn!("Failed to spawn polling thread for pin {pin}: {e}");
                false
            }
        }
    }

    /// Cooperative teardown: flags the loop to stop and waits for it to
    /// notice, which takes up to one poll interval.
    pub fn unregister(&self, pin: u8) -> bool {
        match self.registrations.lock().remove(&pin) {
            Some(registration) => {
                drop(registration);
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let mut registrations = self.registrations.lock();
        for (pin, registration) in registrations.drain() {
            trace!("Stopping event polling for pin {pin}");
            drop(registration);
        }
    }

    pub fn is_polling(&self, pin: u8) -> bool {
        self.registrations.lock().contains_key(&pin)
    }

    pub fn active_pins(&self) -> Vec<u8> {
        let mut pins: Vec<u8> = self.registrations.lock().keys().copied().collect();
        pins.sort_unstable();
        pins
    }
}

impl Drop for EventPoller {
    fn drop(&mut self) {
        self.stop_all();
    }
}
