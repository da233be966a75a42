//! Bounded retry around the mobile persona-run.
//!
//! Only the mobile search is recoverable. When it fails with points still
//! left, the whole mobile session is torn down and relaunched, up to
//! `max_attempts` extra times. Past that, the run gives up on the search
//! and the account carries on; giving up is a warning, not an error.

use tracing::{info, warn};

use crate::models::account::AccountCredential;
use crate::models::points::PointSnapshot;
use crate::network::NetworkContext;
use crate::orchestrator::session_runner::{MobileAttempt, SearchResolution, SessionRunner};
use crate::Result;

/// Retry bookkeeping for one account's mobile run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
}

/// Decision after a failed-with-remaining-points search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Relaunch the mobile session.
    Retry,
    /// Retry budget spent.
    GiveUp,
}

impl RetryState {
    /// Fresh state with no recorded failures.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    /// Failed-with-remaining-points searches so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Retry budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Record one incomplete search and decide what to do next.
    pub fn record_incomplete(&mut self) -> RetryDecision {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts > self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry
        }
    }
}

/// How the mobile persona-run ended for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobileOutcome {
    /// Zero-points gate stopped the run.
    SoftStopped,
    /// The run reached the final balance fetch.
    Completed {
        /// Point bookkeeping for the final attempt.
        points: PointSnapshot,
        /// Mobile search result.
        search: SearchResolution,
    },
    /// The retry budget ran out with the search still incomplete.
    GaveUp {
        /// Incomplete searches recorded (budget + 1).
        attempts: u32,
        /// Points still left when giving up.
        remaining: i64,
    },
}

/// Drives mobile attempts until one finishes or the budget runs out.
///
/// One controller per account; its [`RetryState`] never resets mid-run.
#[derive(Debug)]
pub struct MobileRetryController {
    state: RetryState,
}

impl MobileRetryController {
    /// Create a controller allowing `max_attempts` retries.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: RetryState::new(max_attempts),
        }
    }

    /// Current retry state.
    #[must_use]
    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Run the mobile persona with bounded search retries.
    ///
    /// # Errors
    ///
    /// Propagates any failure outside the mobile search itself.
    pub async fn run(
        &mut self,
        runner: &SessionRunner,
        account: &AccountCredential,
        net: &NetworkContext,
    ) -> Result<MobileOutcome> {
        let mut launch: u32 = 1;
        let mut seed: Option<i64> = None;
        loop {
            match runner.run_mobile_attempt(account, net, launch, seed).await? {
                MobileAttempt::SoftStopped => return Ok(MobileOutcome::SoftStopped),
                MobileAttempt::Finished { points, search } => {
                    return Ok(MobileOutcome::Completed { points, search });
                }
                MobileAttempt::SearchIncomplete {
                    remaining,
                    initial_points,
                } => {
                    seed.get_or_insert(initial_points);
                    match self.state.record_incomplete() {
                        RetryDecision::GiveUp => {
                            warn!(
                                max_attempts = self.state.max_attempts(),
                                remaining,
                                "max retry limit reached, giving up on mobile search"
                            );
                            return Ok(MobileOutcome::GaveUp {
                                attempts: self.state.attempts(),
                                remaining,
                            });
                        }
                        RetryDecision::Retry => {
                            info!(
                                attempt = self.state.attempts(),
                                max_attempts = self.state.max_attempts(),
                                "unable to complete mobile searches (bad user agent? \
                                 search delay too short?), retrying"
                            );
                            launch += 1;
                        }
                    }
                }
            }
        }
    }
}
