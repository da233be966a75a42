//! Log-quiescence watchdog.
//!
//! Every tracing event (and every relayed worker log line) touches a
//! shared [`ActivitySignal`]. A [`LogWatchdog`] fires
//! [`LivenessEvent::Stalled`] once the quiescence window passes without a
//! touch, and [`LivenessEvent::Recovered`] when activity resumes.
//!
//! The watchdog's own events are logged under [`LIVENESS_TARGET`], which
//! [`ActivityLayer`] ignores, so reporting a stall does not end it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Event, Instrument, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Tracing target for liveness bookkeeping; not counted as activity.
pub const LIVENESS_TARGET: &str = "liveness";

/// Shared "something was logged" signal.
#[derive(Debug, Clone, Default)]
pub struct ActivitySignal(Arc<Notify>);

impl ActivitySignal {
    /// Create a fresh signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record activity now.
    pub fn touch(&self) {
        self.0.notify_one();
    }

    async fn wait(&self) {
        self.0.notified().await;
    }
}

/// Tracing layer that touches an [`ActivitySignal`] on every event.
#[derive(Debug, Clone)]
pub struct ActivityLayer {
    signal: ActivitySignal,
}

impl ActivityLayer {
    /// Create a layer feeding `signal`.
    #[must_use]
    pub fn new(signal: ActivitySignal) -> Self {
        Self { signal }
    }
}

impl<S: Subscriber> Layer<S> for ActivityLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != LIVENESS_TARGET {
            self.signal.touch();
        }
    }
}

/// Events emitted by the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEvent {
    /// Nothing was logged for the whole window.
    Stalled {
        /// Length of the silent window in seconds.
        idle_seconds: u64,
    },
    /// Logging resumed after a stall.
    Recovered,
}

/// Builder for the watchdog. Call [`spawn`](Self::spawn) to start it.
pub struct LogWatchdog {
    window: Duration,
    signal: ActivitySignal,
    event_tx: mpsc::Sender<LivenessEvent>,
    cancel: CancellationToken,
}

impl LogWatchdog {
    /// Construct a watchdog (not started yet).
    #[must_use]
    pub fn new(
        window: Duration,
        signal: ActivitySignal,
        event_tx: mpsc::Sender<LivenessEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            window,
            signal,
            event_tx,
            cancel,
        }
    }

    /// Start the timer task.
    #[must_use]
    pub fn spawn(self) -> LogWatchdogHandle {
        let stalled = Arc::new(AtomicBool::new(false));
        let cancel = self.cancel.clone();

        let join_handle = tokio::spawn(
            Self::run(
                self.window,
                self.signal,
                self.event_tx,
                self.cancel,
                Arc::clone(&stalled),
            )
            .instrument(info_span!("log_watchdog")),
        );

        LogWatchdogHandle {
            stalled,
            join_handle: Some(join_handle),
            cancel,
        }
    }

    async fn run(
        window: Duration,
        signal: ActivitySignal,
        event_tx: mpsc::Sender<LivenessEvent>,
        cancel: CancellationToken,
        stalled: Arc<AtomicBool>,
    ) {
        loop {
            let fired = tokio::select! {
                () = cancel.cancelled() => {
                    debug!(target: LIVENESS_TARGET, "log watchdog cancelled");
                    return;
                }
                () = tokio::time::sleep(window) => true,
                () = signal.wait() => false,
            };

            if !fired {
                if stalled.swap(false, Ordering::SeqCst) {
                    let _ = event_tx.send(LivenessEvent::Recovered).await;
                }
                continue;
            }

            if !stalled.swap(true, Ordering::SeqCst) {
                let idle_seconds = window.as_secs();
                warn!(
                    target: LIVENESS_TARGET,
                    idle_seconds,
                    "no log activity within the quiescence window"
                );
                let _ = event_tx.send(LivenessEvent::Stalled { idle_seconds }).await;
            }
        }
    }
}

/// Handle for a running watchdog; cancels it on drop.
pub struct LogWatchdogHandle {
    stalled: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl Drop for LogWatchdogHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl LogWatchdogHandle {
    /// Whether the watchdog currently considers the process stalled.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::SeqCst)
    }

    /// Stop the watchdog and wait for its task to finish.
    pub async fn await_completion(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}
