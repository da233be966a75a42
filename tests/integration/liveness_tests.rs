//! Log-quiescence watchdog timing and the tracing activity layer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;

use rewards_runner::orchestrator::liveness::{
    ActivityLayer, ActivitySignal, LivenessEvent, LogWatchdog, LIVENESS_TARGET,
};

fn watchdog(
    window_secs: u64,
    signal: &ActivitySignal,
) -> (LogWatchdog, mpsc::Receiver<LivenessEvent>, CancellationToken) {
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(8);
    let watchdog = LogWatchdog::new(
        Duration::from_secs(window_secs),
        signal.clone(),
        tx,
        cancel.clone(),
    );
    (watchdog, rx, cancel)
}

async fn touch_for(signal: &ActivitySignal, total: Duration) {
    let step = Duration::from_millis(200);
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        signal.touch();
        tokio::time::sleep(step).await;
        elapsed += step;
    }
}

#[tokio::test]
async fn silence_for_the_window_reports_a_stall() {
    let signal = ActivitySignal::new();
    let (detector, mut rx, _cancel) = watchdog(1, &signal);
    let handle = detector.spawn();

    let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("should stall before timeout")
        .expect("channel open");

    assert_eq!(event, LivenessEvent::Stalled { idle_seconds: 1 });
    assert!(handle.is_stalled());
}

#[tokio::test]
async fn activity_keeps_the_watchdog_quiet() {
    let signal = ActivitySignal::new();
    let (detector, mut rx, _cancel) = watchdog(1, &signal);
    let handle = detector.spawn();

    touch_for(&signal, Duration::from_millis(1600)).await;

    assert!(rx.try_recv().is_err(), "no stall while logging continues");
    assert!(!handle.is_stalled());
}

#[tokio::test]
async fn stall_is_reported_once_then_recovery_follows_activity() {
    let signal = ActivitySignal::new();
    let (detector, mut rx, _cancel) = watchdog(1, &signal);
    let handle = detector.spawn();

    let first = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, LivenessEvent::Stalled { .. }));

    // Two more silent windows do not repeat the report.
    tokio::time::sleep(Duration::from_millis(2200)).await;
    assert!(rx.try_recv().is_err());

    signal.touch();
    let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, LivenessEvent::Recovered);
    assert!(!handle.is_stalled());
}

#[tokio::test]
async fn await_completion_stops_the_timer() {
    let signal = ActivitySignal::new();
    let (detector, mut rx, cancel) = watchdog(1, &signal);
    let handle = detector.spawn();

    handle.await_completion().await;
    assert!(cancel.is_cancelled());

    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert!(matches!(
        rx.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));
}

#[tokio::test]
async fn dropping_the_handle_cancels_the_watchdog() {
    let signal = ActivitySignal::new();
    let (detector, _rx, cancel) = watchdog(1, &signal);

    drop(detector.spawn());
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn tracing_events_count_as_activity_except_liveness_ones() {
    let signal = ActivitySignal::new();
    let subscriber = tracing_subscriber::registry().with(ActivityLayer::new(signal.clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    let (detector, mut rx, _cancel) = watchdog(1, &signal);
    let _handle = detector.spawn();

    for _ in 0..8 {
        tracing::info!("working");
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert!(rx.try_recv().is_err(), "ordinary events reset the window");

    let stalled = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            tracing::info!(target: LIVENESS_TARGET, "still watching");
            tokio::time::sleep(Duration::from_millis(200)).await;
            if let Ok(event) = rx.try_recv() {
                return event;
            }
        }
    })
    .await
    .expect("liveness events do not count as activity");
    assert!(matches!(stalled, LivenessEvent::Stalled { .. }));
}
