//! Process supervision with a crash-only policy.
//!
//! Termination requests (SIGTERM), interrupts (Ctrl-C), panics anywhere
//! in the process, and errors reaching the top of the run all end in
//! [`fatal_exit`]. Nothing tries to recover in-process; cleanup is each
//! component's own scoped-resource responsibility. Every exit goes
//! through [`exit_process`], which logs the final code.

use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::LivenessConfig;
use crate::orchestrator::dispatcher::Completion;
use crate::orchestrator::liveness::{
    ActivitySignal, LivenessEvent, LogWatchdog, LogWatchdogHandle, LIVENESS_TARGET,
};
use crate::Result;

/// Exit code for every forced termination.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Log the final exit code and terminate the process.
pub fn exit_process(code: i32) -> ! {
    if code == 0 {
        info!(tag = "SHUTDOWN", code, "process exiting");
    } else {
        error!(tag = "SHUTDOWN", code, "process exiting");
    }
    std::process::exit(code)
}

/// Log `reason` under `tag` and terminate with [`FATAL_EXIT_CODE`].
pub fn fatal_exit(tag: &str, reason: &str) -> ! {
    error!(tag, reason, "forcing process termination");
    exit_process(FATAL_EXIT_CODE)
}

/// Route every panic, on any thread or task, to the fatal exit path.
pub fn install_fault_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        fatal_exit("UNCAUGHT-EXCEPTION", &panic_info.to_string());
    }));
}

/// Process-wide supervisor: signal handlers plus the liveness watchdog.
pub struct ProcessSupervisor {
    liveness: LivenessConfig,
    activity: ActivitySignal,
    watchdog_cancel: CancellationToken,
}

impl ProcessSupervisor {
    /// Create a supervisor. Handlers are installed separately.
    #[must_use]
    pub fn new(liveness: LivenessConfig, activity: ActivitySignal) -> Self {
        Self {
            liveness,
            activity,
            watchdog_cancel: CancellationToken::new(),
        }
    }

    /// Cancellation token of the watchdog started by [`supervise`](Self::supervise).
    #[must_use]
    pub fn watchdog_token(&self) -> &CancellationToken {
        &self.watchdog_cancel
    }

    /// Spawn the signal listener. Must be called inside the runtime.
    pub fn install_signal_handlers(&self) {
        tokio::spawn(async {
            let reason = termination_signal().await;
            fatal_exit("SHUTDOWN", reason);
        });
    }

    /// Run `run` with the watchdog active and turn its result into an exit code.
    ///
    /// The watchdog is stopped on both paths before the result is
    /// inspected. An error never returns: it takes the fatal exit path.
    pub async fn supervise<F>(&self, run: F) -> i32
    where
        F: Future<Output = Result<Completion>>,
    {
        let watchdog = self.start_watchdog();

        let result = run.await;

        if let Some(watchdog) = watchdog {
            watchdog.await_completion().await;
        }

        match result {
            Ok(completion) => {
                info!(tag = "MAIN", ?completion, "completed tasks");
                0
            }
            Err(err) => fatal_exit("MAIN-ERROR", &format!("error running tasks: {err}")),
        }
    }

    fn start_watchdog(&self) -> Option<LogWatchdogHandle> {
        if !self.liveness.enabled {
            return None;
        }

        let (tx, mut rx) = mpsc::channel(8);
        let handle = LogWatchdog::new(
            self.liveness.quiescence_window(),
            self.activity.clone(),
            tx,
            self.watchdog_cancel.clone(),
        )
        .spawn();

        let terminate_on_stall = self.liveness.terminate_on_stall;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    LivenessEvent::Stalled { idle_seconds } if terminate_on_stall => {
                        fatal_exit(
                            "LIVENESS",
                            &format!("no log activity for {idle_seconds}s"),
                        );
                    }
                    LivenessEvent::Stalled { idle_seconds } => {
                        error!(target: LIVENESS_TARGET, idle_seconds, "process appears stalled");
                    }
                    LivenessEvent::Recovered => {
                        info!(target: LIVENESS_TARGET, "log activity resumed");
                    }
                }
            }
        });

        Some(handle)
    }
}

async fn termination_signal() -> &'static str {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => "process interrupted",
                    _ = sigterm.recv() => "process terminated",
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
                "process interrupted"
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        "process interrupted"
    }
}
