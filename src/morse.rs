use std::sync::Arc;
use std::time::Duration;

use log::{trace, warn};
use serde::Serialize;
use tokio::time::sleep;

use crate::config::{PinMode, PinState};
use crate::controller::PinController;
use crate::error::GpioError;

/// ITU code for a single character; unmapped characters fall through
/// verbatim and are rejected by `is_valid_morse` before any pin is touched.
fn morse_symbol(c: char) -> Option<&'static str> {
    let code = match c.to_ascii_uppercase() {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        '.' => ".-.-.-",
        ',' => "--..--",
        '?' => "..--..",
        '!' => "-.-.--",
        '/' => "-..-.",
        '@' => ".--.-.",
        '\'' => ".----.",
        '"' => ".-..-.",
        '=' => "-...-",
        '+' => ".-.-.",
        '-' => "-....-",
        ':' => "---...",
        _ => return None,
    };
    Some(code)
}

/// Converts a sentence to Morse: letters joined by single spaces, words by
/// double spaces.
pub fn encode(sentence: &str) -> String {
    let words: Vec<String> = sentence
        .split_whitespace()
        .map(|word| {
            word.chars()
                .map(|c| match morse_symbol(c) {
                    Some(code) => code.to_string(),
                    None => c.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    words.join("  ")
}

pub fn is_valid_morse(morse: &str) -> bool {
    !morse.is_empty() && morse.chars().all(|c| matches!(c, '.' | '-' | ' '))
}

#[derive(Debug, Clone, Serialize)]
pub struct MorseCycleResult {
    pub text: String,
    pub morse: String,
}

/// Keys a relay pin with Morse timing: dot = one unit on, dash = three,
/// letter gap = one unit idle, word gap = seven.
pub struct MorseRelayTranslator {
    controller: Arc<PinController>,
}

impl MorseRelayTranslator {
    pub fn new(controller: Arc<PinController>) -> Self {
        Self { controller }
    }

    pub async fn relay_morse_cycle(
        &self,
        text: &str,
        pin: u8,
        unit: Duration,
    ) -> Result<MorseCycleResult, GpioError> {
        if text.trim().is_empty() {
            return Err(GpioError::InvalidMorseInput("empty input".into()));
        }
        if !self.controller.relay_pins().contains(&pin) {
            return Err(GpioError::InvalidPin(pin));
        }

        let morse = encode(text);
        trace!("TEXT >> {text}");
        trace!("MORSE >> {morse}");

        // fail closed before any hardware access
        if !is_valid_morse(&morse) {
            warn!("Conversion produced invalid morse for {text:?}");
            return Err(GpioError::InvalidMorseInput(format!(
                "{text:?} contains characters with no morse equivalent"
            )));
        }

        if self.controller.get_pin_config(pin).is_on() {
            self.controller.set_pin(pin, PinMode::Output, PinState::Off)?;
        }

        // double space separates words (seven units), single space letters
        let keyed = morse.replace("  ", "_______").replace(' ', "_");

        for symbol in keyed.chars() {
            match symbol {
                '.' => self.pulse(pin, unit, unit).await?,
                '-' => self.pulse(pin, 3 * unit, unit).await?,
                '_' => sleep(unit).await,
                _ => unreachable!("validated above"),
            }
        }

        // leave the bank exactly as the relay scripts do
        for &relay in self.controller.relay_pins() {
            if let Err(e) = self
                .controller
                .set_pin_forced(relay, PinMode::Output, PinState::Off)
            {
                warn!("Post-morse reset failed on pin {relay}: {e}");
            }
        }

        Ok(MorseCycleResult {
            text: text.to_string(),
            morse,
        })
    }

    async fn pulse(&self, pin: u8, width: Duration, unit: Duration) -> Result<(), GpioError> {
        self.controller
            .set_pin_with_timeout(pin, PinMode::Output, PinState::On, width)?;
        // hold for the pulse plus one settle unit so the detached reversion
        // lands before the next element keys the pin again
        sleep(width + unit).await;
        Ok(())
    }
}
