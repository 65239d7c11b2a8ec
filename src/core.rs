use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use tokio::sync::broadcast::error::RecvError;

use crate::config::{EdgeDetect, GpioConfig, PinMode, PinState};
use crate::controller::PinController;
use crate::driver::{self, GpioDriver};
use crate::error::GpioError;
use crate::morse::{MorseCycleResult, MorseRelayTranslator};
use crate::poller::{EdgeEvent, EventPoller};
use crate::relay::{RelayChoreographer, RelayCycle};
use crate::store::PinConfigStore;

/// The gpio subsystem context: owns the driver, pin store, controller,
/// poller and the relay/morse services built on top. Front-ends hold one of
/// these; tests build a fresh one per case.
pub struct GpioCore {
    config: Arc<GpioConfig>,
    store: Arc<PinConfigStore>,
    controller: Arc<PinController>,
    poller: Arc<EventPoller>,
    choreographer: RelayChoreographer,
    morse: MorseRelayTranslator,
}

impl GpioCore {
    /// Opens the configured driver backend and wires the subsystem up.
    /// An unavailable backend is fatal here; nothing is constructed that
    /// could later touch hardware half-initialized.
    pub fn init(config: Arc<GpioConfig>) -> Result<Self, GpioError> {
        config.validate()?;
        let driver = driver::open_driver(&config)?;
        Self::init_with_driver(config, driver)
    }

    pub fn init_with_driver(
        config: Arc<GpioConfig>,
        driver: Arc<dyn GpioDriver>,
    ) -> Result<Self, GpioError> {
        config.validate()?;

        let store = Arc::new(PinConfigStore::load_from_file(&config.pin_state_path));
        store.ensure_defaults(&config.available_pins, &config.relay_pins);
        debug!("Pin store ready with {} entries", store.len());

        let controller = Arc::new(PinController::new(driver.clone(), store.clone(), &config));
        let poller = Arc::new(EventPoller::new(
            driver,
            config.available_pins.iter().copied().collect(),
            Duration::from_millis(config.poll_interval_ms),
            config.event_capacity,
        ));
        let choreographer = RelayChoreographer::new(controller.clone());
        let morse = MorseRelayTranslator::new(controller.clone());

        Ok(Self {
            config,
            store,
            controller,
            poller,
            choreographer,
            morse,
        })
    }

    /// Registers polling for every relay, IR and sound-sensor pin and spawns
    /// a subscriber that logs transitions per pin category.
    pub fn start_monitoring(&self) {
        for &pin in &self.config.relay_pins {
            self.poller.register(pin, EdgeDetect::Both);
        }
        for &pin in &self.config.ir_sensor_pins {
            self.poller.register(pin, EdgeDetect::Both);
        }
        for &pin in &self.config.sound_sensor_pins {
            self.poller.register(pin, EdgeDetect::Both);
        }

        let mut events = self.poller.subscribe();
        let config = self.config.clone();
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        debug!("Event monitor lagged, {missed} events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                log_pin_event(&config, &event);
            }
        });
    }

    pub async fn relay_test(
        &self,
        cycle: RelayCycle,
        channel: Option<u8>,
    ) -> Result<bool, GpioError> {
        self.choreographer.run(cycle, channel).await
    }

    pub async fn relay_morse_cycle(
        &self,
        text: &str,
        pin: u8,
        unit_ms: u64,
    ) -> Result<MorseCycleResult, GpioError> {
        self.morse
            .relay_morse_cycle(text, pin, Duration::from_millis(unit_ms))
            .await
    }

    /// Stops polling, optionally forces the relay bank Off, persists the pin
    /// store and marks the controller uninitialized. Detached reversion
    /// timers still pending at this point are lost by design.
    pub fn shutdown(&self) -> Result<(), GpioError> {
        self.poller.stop_all();

        if self.config.close_relay_on_shutdown {
            for &pin in &self.config.relay_pins {
                if self.store.get(pin).is_on() {
                    match self
                        .controller
                        .set_pin_forced(pin, PinMode::Output, PinState::Off)
                    {
                        Ok(()) => info!("Closed pin {pin} as part of shutdown"),
                        Err(e) => warn!("Could not close pin {pin} on shutdown: {e}"),
                    }
                }
            }
        }

        self.store.save_to_file(&self.config.pin_state_path)?;
        self.controller.invalidate();
        info!("Gpio subsystem shut down");
        Ok(())
    }

    pub fn config(&self) -> &GpioConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PinConfigStore> {
        &self.store
    }

    pub fn controller(&self) -> &Arc<PinController> {
        &self.controller
    }

    pub fn poller(&self) -> &Arc<EventPoller> {
        &self.poller
    }

    pub fn choreographer(&self) -> &RelayChoreographer {
        &self.choreographer
    }

    pub fn morse(&self) -> &MorseRelayTranslator {
        &self.morse
    }
}

fn log_pin_event(config: &GpioConfig, event: &EdgeEvent) {
    let pin = event.pin;
    if config.is_relay_pin(pin) {
        match event.current {
            PinState::On => info!("Relay module on pin {pin} energized"),
            PinState::Off => info!("Relay module on pin {pin} released"),
        }
    } else if config.ir_sensor_pins.contains(&pin) {
        match event.current {
            PinState::On => info!("Object detected in front of ir sensor on pin {pin}"),
            PinState::Off => trace!("Ir sensor on pin {pin} is clear"),
        }
    } else if config.sound_sensor_pins.contains(&pin) {
        match event.current {
            PinState::On => info!("Sound detected on pin {pin}"),
            PinState::Off => trace!("No sound on pin {pin}"),
        }
    } else {
        debug!(
            "Pin {pin} changed {:?} -> {:?}",
            event.previous, event.current
        );
    }
}
