use std::{fs, path::Path};

use log::{trace, warn};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::{PinMode, PinState};
use crate::error::GpioError;

/// Last-known configuration of a single pin. One entry per whitelisted pin;
/// mutated only by the controller, as a whole or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinEntry {
    pub pin: u8,
    pub mode: PinMode,
    pub state: PinState,
    #[serde(default)]
    pub pending_task: bool,
    #[serde(default)]
    pub task_delay_minutes: u32,
}

impl PinEntry {
    pub fn new(pin: u8, mode: PinMode, state: PinState) -> Self {
        Self {
            pin,
            mode,
            state,
            pending_task: false,
            task_delay_minutes: 0,
        }
    }

    pub fn unknown(pin: u8) -> Self {
        Self::new(pin, PinMode::Input, PinState::Off)
    }

    pub fn is_on(&self) -> bool {
        self.state == PinState::On
    }
}

pub struct PinConfigStore {
    entries: RwLock<FxHashMap<u8, PinEntry>>,
}

impl PinConfigStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    /// Loads persisted entries if the file exists, otherwise starts empty.
    /// A malformed file is logged and treated as empty rather than fatal.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let store = Self::new();

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return store,
        };
        match serde_json::from_str::<Vec<PinEntry>>(&contents) {
            Ok(entries) => {
                let mut map = store.entries.write();
                for entry in entries {
                    map.insert(entry.pin, entry);
                }
                trace!("Loaded {} persisted pin entries", map.len());
            }
            Err(e) => warn!("Ignoring malformed pin state file: {e}"),
        }

        store
    }

    /// Writes the whole collection to `path.new`, then swaps it into place so
    /// a crash mid-write cannot truncate the previous state.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GpioError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| GpioError::Config(format!("Failed to serialize pin state: {e}")))?;

        let staging = path.with_extension("new");
        fs::write(&staging, json)
            .map_err(|e| GpioError::Config(format!("Failed to write pin state: {e}")))?;
        fs::rename(&staging, path)
            .map_err(|e| GpioError::Config(format!("Failed to replace pin state file: {e}")))?;

        trace!("Persisted pin state to {}", path.display());
        Ok(())
    }

    /// Default-generates entries for whitelisted pins the persisted file did
    /// not know about. Relay pins start as outputs, everything else as input.
    pub fn ensure_defaults(&self, available_pins: &[u8], relay_pins: &[u8]) {
        let mut map = self.entries.write();
        for &pin in available_pins {
            map.entry(pin).or_insert_with(|| {
                let mode = if relay_pins.contains(&pin) {
                    PinMode::Output
                } else {
                    PinMode::Input
                };
                PinEntry::new(pin, mode, PinState::Off)
            });
        }
    }

    /// Tolerant read: an unknown pin yields a default entry, not an error.
    pub fn get(&self, pin: u8) -> PinEntry {
        self.entries
            .read()
            .get(&pin)
            .copied()
            .unwrap_or_else(|| PinEntry::unknown(pin))
    }

    pub fn update(&self, entry: PinEntry) {
        self.entries.write().insert(entry.pin, entry);
    }

    pub fn snapshot(&self) -> Vec<PinEntry> {
        let mut entries: Vec<PinEntry> = self.entries.read().values().copied().collect();
        entries.sort_by_key(|e| e.pin);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for PinConfigStore {
    fn default() -> Self {
        Self::new()
    }
}
