//! Unit tests for mobile-search retry bookkeeping.

use rewards_runner::orchestrator::mobile_retry::{RetryDecision, RetryState};

#[test]
fn fresh_state_has_no_attempts() {
    let state = RetryState::new(2);
    assert_eq!(state.attempts(), 0);
    assert_eq!(state.max_attempts(), 2);
}

#[test]
fn retries_until_attempts_exceed_max() {
    let mut state = RetryState::new(2);
    assert_eq!(state.record_incomplete(), RetryDecision::Retry);
    assert_eq!(state.record_incomplete(), RetryDecision::Retry);
    assert_eq!(state.record_incomplete(), RetryDecision::GiveUp);
    assert_eq!(state.attempts(), 3);
}

#[test]
fn zero_budget_gives_up_on_first_failure() {
    let mut state = RetryState::new(0);
    assert_eq!(state.record_incomplete(), RetryDecision::GiveUp);
    assert_eq!(state.attempts(), 1);
}

#[test]
fn attempts_never_decrease() {
    let mut state = RetryState::new(5);
    let mut previous = state.attempts();
    for _ in 0..8 {
        state.record_incomplete();
        assert!(state.attempts() > previous);
        previous = state.attempts();
    }
}
