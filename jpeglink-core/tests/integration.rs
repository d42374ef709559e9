//! Integration tests: full lifecycle against the simulated peripheral,
//! inactivity timeout, debounce, and abort scenarios.

use std::time::Duration;

use bytes::Bytes;
use jpeglink_core::{
    ConnectionState, EngineConfig, EngineHandle, InvalidReason, LinkEngine, ObserverEvent,
    SimConfig, SimPeripheral, TransferOutcome, WatchObserver, engine_channel,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ── Helpers ──────────────────────────────────────────────────────

fn sample_jpeg(body_len: usize) -> Bytes {
    let mut jpeg = vec![0xFF, 0xD8];
    jpeg.extend((0..body_len).map(|i| (i * 7 % 256) as u8));
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    Bytes::from(jpeg)
}

/// Spawn an engine wired to a simulated peripheral and power it on.
fn spawn_sim(
    sim: SimConfig,
) -> (
    EngineHandle,
    mpsc::UnboundedReceiver<ObserverEvent>,
    JoinHandle<()>,
) {
    let (handle, inbox) = engine_channel();
    let peripheral = SimPeripheral::new(sim, handle.clone());
    peripheral.power_on().unwrap();
    let (obs_tx, events) = mpsc::unbounded_channel();
    let task = LinkEngine::new(EngineConfig::default(), peripheral, obs_tx, inbox).spawn_task();
    (handle, events, task)
}

async fn wait_for_state(events: &mut mpsc::UnboundedReceiver<ObserverEvent>, want: ConnectionState) {
    while let Some(event) = events.recv().await {
        if event == ObserverEvent::StateChanged(want) {
            return;
        }
    }
    panic!("observer closed before {want}");
}

async fn next_outcome(events: &mut mpsc::UnboundedReceiver<ObserverEvent>) -> TransferOutcome {
    while let Some(event) = events.recv().await {
        if let ObserverEvent::Outcome(outcome) = event {
            return outcome;
        }
    }
    panic!("observer closed without an outcome");
}

// ── Lifecycle ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_full_transfer_over_simulator() {
    let jpeg = sample_jpeg(1000);
    let (handle, mut events, task) = spawn_sim(SimConfig::new(jpeg.clone()));

    handle.start().unwrap();
    wait_for_state(&mut events, ConnectionState::Subscribed).await;

    handle.request_transfer().unwrap();
    let outcome = next_outcome(&mut events).await;
    assert_eq!(outcome, TransferOutcome::Success(jpeg.clone()));

    // A second request on the same link works the same way.
    handle.request_transfer().unwrap();
    assert_eq!(next_outcome(&mut events).await, TransferOutcome::Success(jpeg));

    handle.shutdown().unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_state_sequence() {
    let (handle, mut events, _task) = spawn_sim(SimConfig::new(sample_jpeg(8)));
    handle.start().unwrap();

    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        if let ObserverEvent::StateChanged(state) = event {
            seen.push(state);
            if state == ConnectionState::Subscribed {
                break;
            }
        }
    }
    assert_eq!(
        seen,
        vec![
            ConnectionState::Scanning,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Discovering,
            ConnectionState::Subscribed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_rescans() {
    let mut sim = SimConfig::new(sample_jpeg(16));
    sim.fail_first_connects = 2;
    let (handle, mut events, _task) = spawn_sim(sim);

    handle.start().unwrap();
    wait_for_state(&mut events, ConnectionState::Error).await;
    wait_for_state(&mut events, ConnectionState::Subscribed).await;
}

// ── Timeout ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_truncated_stream_times_out_invalid() {
    let mut sim = SimConfig::new(sample_jpeg(500));
    sim.truncate_tail = 2;
    let (handle, mut events, _task) = spawn_sim(sim);

    handle.start().unwrap();
    wait_for_state(&mut events, ConnectionState::Subscribed).await;
    handle.request_transfer().unwrap();

    let outcome = next_outcome(&mut events).await;
    assert_eq!(
        outcome,
        TransferOutcome::Invalid(InvalidReason::MissingEndMarker)
    );

    // Still subscribed and ready for another go.
    handle.request_transfer().unwrap();
    assert!(matches!(
        next_outcome(&mut events).await,
        TransferOutcome::Invalid(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_slow_fragments_under_timeout_complete_by_length() {
    let jpeg = sample_jpeg(40);
    let mut sim = SimConfig::new(jpeg.clone());
    sim.mtu = 8;
    sim.fragment_interval = Duration::from_millis(300);
    let (handle, mut events, _task) = spawn_sim(sim);

    handle.start().unwrap();
    wait_for_state(&mut events, ConnectionState::Subscribed).await;

    let started = tokio::time::Instant::now();
    handle.request_transfer().unwrap();
    assert_eq!(next_outcome(&mut events).await, TransferOutcome::Success(jpeg));
    // 52 wire bytes in 7 fragments, 300 ms apart.
    assert!(started.elapsed() >= Duration::from_millis(2100));
}

// ── Abort ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_stop_mid_transfer_emits_no_outcome() {
    let mut sim = SimConfig::new(sample_jpeg(400));
    sim.mtu = 20;
    sim.fragment_interval = Duration::from_millis(50);
    let (handle, mut events, _task) = spawn_sim(sim);

    handle.start().unwrap();
    wait_for_state(&mut events, ConnectionState::Subscribed).await;
    handle.request_transfer().unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    handle.stop().unwrap();
    wait_for_state(&mut events, ConnectionState::Idle).await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, ObserverEvent::Outcome(_)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_request_before_subscribed_is_rejected() {
    let (handle, mut events, _task) = spawn_sim(SimConfig::new(sample_jpeg(8)));

    handle.request_transfer().unwrap();
    loop {
        match events.recv().await {
            Some(ObserverEvent::Status(text)) if text == "Peripheral unavailable for JPEG request" => {
                break;
            }
            Some(ObserverEvent::StateChanged(state)) => panic!("unexpected state change to {state}"),
            Some(_) => {}
            None => panic!("observer closed"),
        }
    }
}

// ── WatchObserver ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_watch_observer_publishes_last_jpeg() {
    let jpeg = sample_jpeg(64);
    let (handle, inbox) = engine_channel();
    let peripheral = SimPeripheral::new(SimConfig::new(jpeg.clone()), handle.clone());
    peripheral.power_on().unwrap();
    let (observer, mut watch) = WatchObserver::new();
    let _task = LinkEngine::new(EngineConfig::default(), peripheral, observer, inbox).spawn_task();

    handle.start().unwrap();
    watch
        .state
        .wait_for(|s| *s == ConnectionState::Subscribed)
        .await
        .unwrap();

    handle.request_transfer().unwrap();
    let got = watch
        .last_jpeg
        .wait_for(|j| j.is_some())
        .await
        .unwrap()
        .clone();
    assert_eq!(got, Some(jpeg));
}
