use std::sync::Arc;
use std::time::Duration;

use pindrive::driver::MockDriver;
use pindrive::{EdgeDetect, EdgeEvent, EventPoller, PinState};
use rustc_hash::FxHashSet;
use tokio::sync::broadcast;
use tokio::time::timeout;

fn build_poller() -> (Arc<EventPoller>, Arc<MockDriver>) {
    let mock = Arc::new(MockDriver::default());
    let whitelist: FxHashSet<u8> = [2, 3, 16, 20, 26].into_iter().collect();
    let poller = Arc::new(EventPoller::new(
        mock.clone(),
        whitelist,
        Duration::from_millis(2),
        64,
    ));
    (poller, mock)
}

async fn next_event(rx: &mut broadcast::Receiver<EdgeEvent>) -> Option<EdgeEvent> {
    timeout(Duration::from_millis(500), rx.recv()).await.ok()?.ok()
}

#[tokio::test]
async fn state_changes_emit_exactly_two_events() {
    let (poller, mock) = build_poller();
    mock.push_read_states(
        26,
        &[
            PinState::On,
            PinState::On,
            PinState::Off,
            PinState::Off,
            PinState::On,
        ],
    );

    let mut rx = poller.subscribe();
    assert!(poller.register(26, EdgeDetect::Both));

    let first = next_event(&mut rx).await.expect("first edge");
    assert_eq!(first.pin, 26);
    assert_eq!(first.previous, PinState::On);
    assert_eq!(first.current, PinState::Off);
    assert_eq!(first.edge(), EdgeDetect::Falling);

    let second = next_event(&mut rx).await.expect("second edge");
    assert_eq!(second.previous, PinState::Off);
    assert_eq!(second.current, PinState::On);
    assert_eq!(second.edge(), EdgeDetect::Rising);

    // the script is exhausted, the line rests at On: no further edges
    assert!(
        timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
        "no third event expected"
    );
}

#[tokio::test]
async fn none_filter_suppresses_all_events() {
    let (poller, mock) = build_poller();
    mock.push_read_states(
        20,
        &[PinState::On, PinState::Off, PinState::On, PinState::Off],
    );

    let mut rx = poller.subscribe();
    assert!(poller.register(20, EdgeDetect::None));

    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
}

#[tokio::test]
async fn rising_filter_only_reports_off_to_on() {
    let (poller, mock) = build_poller();
    mock.push_read_states(16, &[PinState::Off, PinState::On, PinState::Off, PinState::On]);

    let mut rx = poller.subscribe();
    assert!(poller.register(16, EdgeDetect::Rising));

    let first = next_event(&mut rx).await.expect("rising edge");
    assert_eq!(first.current, PinState::On);
    let second = next_event(&mut rx).await.expect("second rising edge");
    assert_eq!(second.current, PinState::On);
}

#[test]
fn second_registration_for_a_pin_is_rejected() {
    let (poller, _mock) = build_poller();

    assert!(poller.register(16, EdgeDetect::Both));
    assert!(!poller.register(16, EdgeDetect::Rising));
    assert_eq!(poller.active_pins(), vec![16]);
}

#[test]
fn unknown_pin_registration_is_rejected() {
    let (poller, _mock) = build_poller();

    assert!(!poller.register(40, EdgeDetect::Both));
    assert!(poller.active_pins().is_empty());
}

#[test]
fn unregister_stops_the_loop_cooperatively() {
    let (poller, _mock) = build_poller();

    assert!(poller.register(26, EdgeDetect::Both));
    assert!(poller.is_polling(26));

    // unregister joins the loop, so a re-registration is possible right away
    assert!(poller.unregister(26));
    assert!(!poller.is_polling(26));
    assert!(!poller.unregister(26));
    assert!(poller.register(26, EdgeDetect::Both));
}

#[tokio::test]
async fn read_failures_do_not_kill_the_loop() {
    let (poller, mock) = build_poller();
    mock.push_read_states(26, &[PinState::Off]);

    let mut rx = poller.subscribe();
    assert!(poller.register(26, EdgeDetect::Both));

    mock.set_fail_reads(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    mock.set_fail_reads(false);

    mock.push_read_states(26, &[PinState::On]);
    let event = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("loop survived the read failures")
        .expect("event received");
    assert_eq!(event.current, PinState::On);
}
