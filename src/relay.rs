use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::config::{PinMode, PinState};
use crate::controller::PinController;
use crate::error::GpioError;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RelayCycle {
    OneOne,
    OneTwo,
    OneMany,
    Single,
    Cycle,
}

impl FromStr for RelayCycle {
    type Err = GpioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oneone" | "one-one" => Ok(RelayCycle::OneOne),
            "onetwo" | "one-two" => Ok(RelayCycle::OneTwo),
            "onemany" | "one-many" => Ok(RelayCycle::OneMany),
            "single" => Ok(RelayCycle::Single),
            "cycle" => Ok(RelayCycle::Cycle),
            other => Err(GpioError::Config(format!("Unknown relay cycle: {other}"))),
        }
    }
}

const SINGLE_HOLD_MS: u64 = 8000;

/// Deterministic relay test scripts. Writes inside one script are strictly
/// sequential so two relay channels never switch in the same instant, and
/// every script starts by forcing the whole bank Off.
pub struct RelayChoreographer {
    controller: Arc<PinController>,
    relay_pins: Vec<u8>,
}

impl RelayChoreographer {
    pub fn new(controller: Arc<PinController>) -> Self {
        let relay_pins = controller.relay_pins().to_vec();
        Self {
            controller,
            relay_pins,
        }
    }

    /// Runs the selected cycle. Individual write failures are logged and do
    /// not abort the rest of the script; the returned flag is the AND of all
    /// write outcomes.
    pub async fn run(&self, cycle: RelayCycle, channel: Option<u8>) -> Result<bool, GpioError> {
        if self.relay_pins.is_empty() {
            warn!("No relay pins configured, skipping relay test");
            return Ok(false);
        }

        info!("Relay test service started: {cycle:?}");
        let ok = match cycle {
            RelayCycle::OneOne => self.one_one().await,
            RelayCycle::OneTwo => self.one_two().await,
            RelayCycle::OneMany => self.one_many().await,
            RelayCycle::Single => {
                let pin = channel.ok_or_else(|| {
                    GpioError::Config("Single cycle requires a relay channel".into())
                })?;
                if !self.relay_pins.contains(&pin) {
                    return Err(GpioError::InvalidPin(pin));
                }
                self.single(pin, Duration::from_millis(SINGLE_HOLD_MS)).await
            }
            RelayCycle::Cycle => {
                // best-effort through all three, failures only taint the result
                let a = self.one_two().await;
                let b = self.one_one().await;
                let c = self.one_many().await;
                a && b && c
            }
        };

        if !ok {
            warn!("One or more relay writes failed during {cycle:?}");
        }
        Ok(ok)
    }

    fn write(&self, pin: u8, state: PinState) -> bool {
        match self.controller.set_pin(pin, PinMode::Output, state) {
            Ok(()) => true,
            Err(e) => {
                warn!("Relay write {state:?} on pin {pin} failed: {e}");
                false
            }
        }
    }

    // forces every channel Off regardless of last-known state
    async fn sweep_off(&self, step: Duration) -> bool {
        let mut ok = true;
        for &pin in &self.relay_pins {
            if let Err(e) = self
                .controller
                .set_pin_forced(pin, PinMode::Output, PinState::Off)
            {
                warn!("Relay sweep failed on pin {pin}: {e}");
                ok = false;
            }
            sleep(step).await;
        }
        ok
    }

    async fn each_pin(&self, state: PinState, step: Duration) -> bool {
        let mut ok = true;
        for &pin in &self.relay_pins {
            ok &= self.write(pin, state);
            sleep(step).await;
        }
        ok
    }

    async fn one_two(&self) -> bool {
        let mut ok = self.sweep_off(Duration::from_millis(30)).await;

        ok &= self.each_pin(PinState::On, Duration::from_millis(400)).await;
        sleep(Duration::from_millis(500)).await;

        ok &= self.each_pin(PinState::Off, Duration::from_millis(150)).await;
        sleep(Duration::from_millis(700)).await;

        ok &= self.each_pin(PinState::On, Duration::from_millis(200)).await;
        sleep(Duration::from_millis(500)).await;

        ok & self.each_pin(PinState::Off, Duration::from_millis(120)).await
    }

    async fn one_one(&self) -> bool {
        let mut ok = self.sweep_off(Duration::from_millis(50)).await;

        for &pin in &self.relay_pins {
            ok &= self.write(pin, PinState::On);
            sleep(Duration::from_millis(500)).await;
            ok &= self.write(pin, PinState::Off);
            sleep(Duration::from_millis(100)).await;
        }
        ok
    }

    async fn one_many(&self) -> bool {
        let mut ok = self.sweep_off(Duration::from_millis(50)).await;

        for &pin in &self.relay_pins {
            ok &= self.write(pin, PinState::On);

            for _ in 0..6 {
                sleep(Duration::from_millis(200)).await;
                ok &= self.write(pin, PinState::Off);
                sleep(Duration::from_millis(500)).await;
                ok &= self.write(pin, PinState::On);
            }

            ok &= self.write(pin, PinState::Off);
        }
        ok
    }

    async fn single(&self, pin: u8, hold: Duration) -> bool {
        let mut ok = self.sweep_off(Duration::from_millis(30)).await;

        ok &= self.write(pin, PinState::On);
        info!("Waiting {} ms to close relay channel {pin}", hold.as_millis());
        sleep(hold).await;
        ok &= self.write(pin, PinState::Off);
        info!("Relay channel {pin} closed");
        ok
    }
}
