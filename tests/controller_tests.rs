use std::sync::Arc;
use std::time::Duration;

use pindrive::driver::MockDriver;
use pindrive::{GpioConfig, GpioCore, GpioError, PinMode, PinState, authorize_pin_write};
use rustc_hash::FxHashSet;

fn sample_config(tag: &str) -> GpioConfig {
    let state_path = std::env::temp_dir()
        .join(format!("pindrive-{tag}-{}.json", std::process::id()))
        .to_string_lossy()
        .into_owned();

    serde_json::from_str(&format!(
        r#"
        {{
            "driver": "mock",
            "relay_pins": [2, 3, 4],
            "ir_sensor_pins": [26, 20],
            "sound_sensor_pins": [16],
            "poll_interval_ms": 2,
            "pin_state_path": "{state_path}"
        }}
        "#
    ))
    .expect("valid sample config")
}

fn build_core(config: GpioConfig) -> (GpioCore, Arc<MockDriver>) {
    let mock = Arc::new(MockDriver::default());
    let core = GpioCore::init_with_driver(Arc::new(config), mock.clone())
        .expect("core init with mock driver");
    (core, mock)
}

#[test]
fn invalid_pin_is_rejected_without_hardware_access() {
    let (core, mock) = build_core(sample_config("invalid-pin"));
    let before = core.store().snapshot();

    let err = core
        .controller()
        .set_pin(41, PinMode::Output, PinState::On)
        .unwrap_err();

    assert!(matches!(err, GpioError::InvalidPin(41)));
    assert!(mock.writes().is_empty());
    assert_eq!(core.store().snapshot(), before);
}

#[test]
fn matching_state_write_is_an_idempotent_no_op() {
    let (core, mock) = build_core(sample_config("idempotent"));

    core.controller()
        .set_pin(2, PinMode::Output, PinState::On)
        .unwrap();
    assert_eq!(mock.writes().len(), 1);

    let before = core.controller().get_pin_config(2);
    core.controller()
        .set_pin(2, PinMode::Output, PinState::On)
        .unwrap();

    assert_eq!(mock.writes().len(), 1, "second write must not reach hardware");
    assert_eq!(core.controller().get_pin_config(2), before);
}

#[test]
fn safe_mode_only_allows_relay_pins() {
    let mut config = sample_config("safe-mode");
    config.safe_mode = true;
    let (core, mock) = build_core(config);

    core.controller()
        .set_pin(2, PinMode::Output, PinState::On)
        .expect("relay pin is writable in safe mode");

    for pin in [26, 16, 21] {
        let err = core
            .controller()
            .set_pin(pin, PinMode::Output, PinState::On)
            .unwrap_err();
        assert!(matches!(err, GpioError::SafeModeRejection(p) if p == pin));
    }
    assert_eq!(mock.writes().len(), 1);
}

#[test]
fn safe_mode_gate_is_a_pure_function() {
    let whitelist: FxHashSet<u8> = [2, 3, 26].into_iter().collect();
    let relay_pins = [2u8, 3];

    assert!(authorize_pin_write(2, &whitelist, &relay_pins, true).is_ok());
    assert!(authorize_pin_write(26, &whitelist, &relay_pins, false).is_ok());
    assert!(matches!(
        authorize_pin_write(26, &whitelist, &relay_pins, true),
        Err(GpioError::SafeModeRejection(26))
    ));
    // the whitelist check wins over the safe-mode check
    assert!(matches!(
        authorize_pin_write(40, &whitelist, &relay_pins, true),
        Err(GpioError::InvalidPin(40))
    ));
    assert!(matches!(
        authorize_pin_write(40, &whitelist, &relay_pins, false),
        Err(GpioError::InvalidPin(40))
    ));
}

#[test]
fn failed_hardware_write_leaves_pin_config_untouched() {
    let (core, mock) = build_core(sample_config("hw-failure"));
    mock.set_fail_writes(true);

    let before = core.controller().get_pin_config(2);
    let err = core
        .controller()
        .set_pin(2, PinMode::Output, PinState::On)
        .unwrap_err();

    assert!(matches!(err, GpioError::HardwareWrite { pin: 2, .. }));
    assert_eq!(core.controller().get_pin_config(2), before);
    assert!(mock.writes().is_empty());
}

#[tokio::test]
async fn timeout_write_reverts_to_the_opposite_state() {
    let (core, mock) = build_core(sample_config("timeout"));

    core.controller()
        .set_pin_with_timeout(2, PinMode::Output, PinState::On, Duration::from_millis(30))
        .unwrap();

    let entry = core.controller().get_pin_config(2);
    assert_eq!(entry.state, PinState::On);
    assert!(entry.pending_task);

    tokio::time::sleep(Duration::from_millis(120)).await;

    let entry = core.controller().get_pin_config(2);
    assert_eq!(entry.state, PinState::Off);
    assert!(!entry.pending_task);
    assert_eq!(mock.writes().len(), 2);
}

#[test]
fn operations_short_circuit_after_shutdown() {
    let (core, mock) = build_core(sample_config("short-circuit"));
    core.shutdown().unwrap();
    mock.clear_writes();

    let err = core
        .controller()
        .set_pin(2, PinMode::Output, PinState::On)
        .unwrap_err();
    assert!(matches!(err, GpioError::NotInitialized));
    assert!(matches!(
        core.controller().read_pin(2),
        Err(GpioError::NotInitialized)
    ));
    assert!(mock.writes().is_empty());
}

#[test]
fn shutdown_sweeps_relays_and_persists_state() {
    let config = sample_config("shutdown-sweep");
    let state_path = config.pin_state_path.clone();
    let (core, mock) = build_core(config.clone());

    core.controller()
        .set_pin(2, PinMode::Output, PinState::On)
        .unwrap();
    core.shutdown().unwrap();

    let last = *mock.writes().last().expect("shutdown sweep recorded");
    assert_eq!(last.pin, 2);
    assert_eq!(last.state, PinState::Off);

    // a fresh core sees the persisted entries again
    let (reloaded, _) = build_core(config);
    assert_eq!(reloaded.controller().get_pin_config(2).state, PinState::Off);
    assert_eq!(reloaded.store().len(), 26);

    let _ = std::fs::remove_file(state_path);
}

#[test]
fn toggle_drives_the_opposite_state() {
    let (core, _mock) = build_core(sample_config("toggle"));

    core.controller()
        .set_pin(2, PinMode::Output, PinState::On)
        .unwrap();
    core.controller().toggle_pin(2).unwrap();
    assert_eq!(core.controller().get_pin_config(2).state, PinState::Off);
}

#[test]
fn physical_pin_lookup_uses_the_j8_header() {
    let (core, _mock) = build_core(sample_config("physical"));

    assert_eq!(core.controller().physical_pin_number(2).unwrap(), 3);
    assert_eq!(core.controller().physical_pin_number(21).unwrap(), 40);
    assert!(matches!(
        core.controller().physical_pin_number(39),
        Err(GpioError::InvalidPin(39))
    ));
}
