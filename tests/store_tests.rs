use pindrive::{PinConfigStore, PinEntry, PinMode, PinState};

fn temp_path(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("pindrive-store-{tag}-{}.json", std::process::id()))
}

#[test]
fn persisted_entries_round_trip_unchanged() {
    let store = PinConfigStore::new();
    store.update(PinEntry::new(2, PinMode::Output, PinState::On));
    store.update(PinEntry::new(26, PinMode::Input, PinState::Off));
    let mut tasked = PinEntry::new(4, PinMode::Output, PinState::Off);
    tasked.pending_task = true;
    tasked.task_delay_minutes = 5;
    store.update(tasked);

    let path = temp_path("round-trip");
    store.save_to_file(&path).unwrap();

    let reloaded = PinConfigStore::load_from_file(&path);
    assert_eq!(reloaded.snapshot(), store.snapshot());

    let _ = std::fs::remove_file(path);
}

#[test]
fn unknown_pin_reads_as_default_entry() {
    let store = PinConfigStore::new();

    let entry = store.get(19);
    assert_eq!(entry.pin, 19);
    assert_eq!(entry.mode, PinMode::Input);
    assert_eq!(entry.state, PinState::Off);
    assert!(store.is_empty(), "tolerant read must not insert entries");
}

#[test]
fn defaults_make_relay_pins_outputs() {
    let store = PinConfigStore::new();
    store.update(PinEntry::new(2, PinMode::Output, PinState::On));

    store.ensure_defaults(&[2, 3, 26], &[2, 3]);

    // existing entries survive, missing ones are generated by category
    assert_eq!(store.get(2).state, PinState::On);
    assert_eq!(store.get(3).mode, PinMode::Output);
    assert_eq!(store.get(26).mode, PinMode::Input);
    assert_eq!(store.len(), 3);
}

#[test]
fn malformed_state_file_is_ignored() {
    let path = temp_path("malformed");
    std::fs::write(&path, "not json at all").unwrap();

    let store = PinConfigStore::load_from_file(&path);
    assert!(store.is_empty());

    let _ = std::fs::remove_file(path);
}
