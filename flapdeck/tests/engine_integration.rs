//! Integration tests for the full mock stack: driver, client and
//! composition engine wired together the way the daemon assembles them.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use flapdeck::alphabet::AlphabetHandle;
use flapdeck::display::{state_channel, Client, Display, DisplayHandle, Engine};
use flapdeck::geometry::{Location, Size};
use flapdeck::link::{Driver, DriverHandle, MockSerial};
use flapdeck::provider::ProviderSet;
use flapdeck::routine::{RoutineConfig, RoutineSpec, TextConfig};

// =============================================================================
// Test Helpers
// =============================================================================

struct TestStack {
    display_handle: DisplayHandle,
    driver: DriverHandle<MockSerial>,
    subscriber: mpsc::Receiver<String>,
    cancel: CancellationToken,
    _dir: tempfile::TempDir,
}

/// Assemble a 5x1 mock display showing a single text routine, activate the
/// dashboard, and run the engine.
async fn start_stack(text: &str) -> TestStack {
    let dir = tempfile::tempdir().unwrap();
    let size = Size::new(5, 1);

    let mut display = Display::new(size);
    display.poll_rate_ms = 100;
    display.save_to(dir.path().join("display.json")).unwrap();
    display.create_dashboard("greeting").unwrap();
    display
        .add_routine_to_dashboard(
            "greeting",
            RoutineSpec {
                config: RoutineConfig::Text(TextConfig {
                    text: text.to_string(),
                }),
                location: Location::new(0, 0),
                size,
            },
        )
        .unwrap();

    let mock = MockSerial::new(size.area());
    let alphabet = AlphabetHandle::seeded();
    let (state_tx, state_rx) = state_channel();
    let callback_alphabet = alphabet.clone();
    let driver = Driver::new(
        mock,
        alphabet.clone(),
        Box::new(move |state| {
            let text =
                callback_alphabet.render(state.modules.iter().map(|module| module.flap_index));
            let _ = state_tx.try_send(text);
        }),
        size.area(),
    )
    .start();

    let client = Client::new(driver.clone());
    let (engine, display_handle) =
        Engine::new(display, client, ProviderSet::new(), alphabet, state_rx);

    let (subscriber_tx, subscriber) = mpsc::channel(32);
    let mut engine = engine.with_subscriber(subscriber_tx);
    engine.activate_dashboard("greeting").unwrap();

    let cancel = CancellationToken::new();
    tokio::spawn(engine.run(cancel.clone()));

    TestStack {
        display_handle,
        driver,
        subscriber,
        cancel,
        _dir: dir,
    }
}

/// Receive subscriber states until one matches, within the deadline.
async fn wait_for_state(subscriber: &mut mpsc::Receiver<String>, wanted: &str) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match subscriber.recv().await {
                Some(state) if state == wanted => return,
                Some(_) => continue,
                None => panic!("subscriber channel closed"),
            }
        }
    })
    .await;
    assert!(result.is_ok(), "never observed state {wanted:?}");
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_mock_round_trip_reaches_subscriber() {
    let mut stack = start_stack("HELLO").await;

    // the routine's text flows through compose, layout, the dedup client,
    // the protocol engine and the mock; the synthetic state frame comes
    // back through the inverse (identity) layout to the subscriber
    wait_for_state(&mut stack.subscriber, "HELLO").await;
    assert_eq!(stack.driver.num_modules(), 5);

    stack.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_direct_set_locks_out_routines() {
    let mut stack = start_stack("HELLO").await;
    wait_for_state(&mut stack.subscriber, "HELLO").await;

    stack
        .display_handle
        .set("SALE!", Duration::from_secs(60))
        .await;
    wait_for_state(&mut stack.subscriber, "SALE!").await;

    // while locked out, the routine's output must not reach the transport;
    // the dedup client also suppresses repeats of the direct text, so no
    // state frames arrive at all
    let extra = tokio::time::timeout(Duration::from_secs(2), stack.subscriber.recv()).await;
    assert!(extra.is_err(), "unexpected state during lockout: {extra:?}");

    stack.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_zero_duration_clears_lockout() {
    let mut stack = start_stack("HELLO").await;
    wait_for_state(&mut stack.subscriber, "HELLO").await;

    stack
        .display_handle
        .set("SALE!", Duration::from_secs(3600))
        .await;
    wait_for_state(&mut stack.subscriber, "SALE!").await;

    // a zero-duration direct set replaces the hour-long lockout with none,
    // so the routine resumes on the next tick
    stack.display_handle.set("$$$$$", Duration::ZERO).await;
    wait_for_state(&mut stack.subscriber, "$$$$$").await;
    wait_for_state(&mut stack.subscriber, "HELLO").await;

    stack.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_new_direct_set_replaces_lockout_deadline() {
    let mut stack = start_stack("HELLO").await;
    wait_for_state(&mut stack.subscriber, "HELLO").await;

    stack
        .display_handle
        .set("AAAAA", Duration::from_secs(3600))
        .await;
    wait_for_state(&mut stack.subscriber, "AAAAA").await;

    // lockout is assigned, not extended: a shorter new lockout shortens
    // the window
    stack
        .display_handle
        .set("BBBBB", Duration::from_secs(2))
        .await;
    wait_for_state(&mut stack.subscriber, "BBBBB").await;
    wait_for_state(&mut stack.subscriber, "HELLO").await;

    stack.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_rotation_cycles_dashboards() {
    let dir = tempfile::tempdir().unwrap();
    let size = Size::new(5, 1);

    let mut display = Display::new(size);
    display.poll_rate_ms = 100;
    display.save_to(dir.path().join("display.json")).unwrap();
    for (name, text) in [("one", "AAAAA"), ("two", "BBBBB")] {
        display.create_dashboard(name).unwrap();
        display
            .add_routine_to_dashboard(
                name,
                RoutineSpec {
                    config: RoutineConfig::Text(TextConfig {
                        text: text.to_string(),
                    }),
                    location: Location::new(0, 0),
                    size,
                },
            )
            .unwrap();
    }
    display
        .create_rotation(
            "cycle",
            flapdeck::dashboard::Rotation::new(vec![
                flapdeck::dashboard::RotationEntry {
                    name: "one".to_string(),
                    duration_secs: 1,
                },
                flapdeck::dashboard::RotationEntry {
                    name: "two".to_string(),
                    duration_secs: 1,
                },
            ]),
        )
        .unwrap();

    let mock = MockSerial::new(size.area());
    let alphabet = AlphabetHandle::seeded();
    let (state_tx, state_rx) = state_channel();
    let callback_alphabet = alphabet.clone();
    let driver = Driver::new(
        mock,
        alphabet.clone(),
        Box::new(move |state| {
            let text =
                callback_alphabet.render(state.modules.iter().map(|module| module.flap_index));
            let _ = state_tx.try_send(text);
        }),
        size.area(),
    )
    .start();

    let (engine, _handle) = Engine::new(
        display,
        Client::new(driver),
        ProviderSet::new(),
        alphabet,
        state_rx,
    );
    let (subscriber_tx, mut subscriber) = mpsc::channel(32);
    let mut engine = engine.with_subscriber(subscriber_tx);
    engine.activate_rotation("cycle").unwrap();

    let cancel = CancellationToken::new();
    tokio::spawn(engine.run(cancel.clone()));

    wait_for_state(&mut subscriber, "AAAAA").await;
    wait_for_state(&mut subscriber, "BBBBB").await;
    wait_for_state(&mut subscriber, "AAAAA").await;

    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_silent_peer_retries_once_then_flushes() {
    let mock = MockSerial::unresponsive(3);
    let driver = Driver::new(
        mock.clone(),
        AlphabetHandle::seeded(),
        Box::new(|_| {}),
        3,
    )
    .start();

    // the startup state request is the frame at the head of the queue;
    // stack more behind it before the first retry window closes
    driver.set_text("AAA").unwrap();
    driver.set_text("BBB").unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;

    // head frame transmitted twice, everything behind it flushed unsent
    assert_eq!(mock.write_count(), 2);

    // the engine keeps serving after a flush
    driver.set_text("CCC").unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(mock.write_count(), 4);

    driver.stop();
}

#[tokio::test(start_paused = true)]
async fn test_cooperating_peer_drains_queue() {
    let mock = MockSerial::new(4);
    let driver = Driver::new(
        mock.clone(),
        AlphabetHandle::seeded(),
        Box::new(|_| {}),
        4,
    )
    .start();

    for text in ["AAAA", "BBBB", "CCCC", "DDDD", "EEEE"] {
        driver.set_text(text).unwrap();
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    // startup request + five configs, each transmitted exactly once
    assert_eq!(mock.write_count(), 6);

    driver.stop();
}
