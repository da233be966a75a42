//! Run orchestration.
//!
//! Covers worker fan-out and exit accounting, per-account sequencing of
//! the desktop and mobile persona-runs, the bounded mobile-search retry
//! loop, and the log-quiescence watchdog.

pub mod coordinator;
pub mod dispatcher;
pub mod liveness;
pub mod mobile_retry;
pub mod session_runner;
pub mod spawner;
