//! Dashboard and point payloads exchanged with the rewards collaborators.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Progress of one point counter (e.g. mobile search).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CounterProgress {
    /// Points already earned on this counter.
    pub point_progress: i64,
    /// Points this counter can award in total.
    pub point_progress_max: i64,
}

impl CounterProgress {
    /// Points still left to earn; may be zero or negative when over-filled.
    #[must_use]
    pub fn remaining(&self) -> i64 {
        self.point_progress_max - self.point_progress
    }
}

/// Search counters reported on the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Counters {
    /// Desktop search counters.
    pub pc_search: Option<Vec<CounterProgress>>,
    /// Mobile search counters; absent for accounts that are too new.
    pub mobile_search: Option<Vec<CounterProgress>>,
}

/// Account status block of the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStatus {
    /// Current point balance.
    pub available_points: i64,
    /// Search counters.
    pub counters: Counters,
}

/// Dashboard snapshot.
///
/// Only the fields the engine reads are typed; everything else is kept
/// verbatim in `extra` and handed back to the task collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    /// Account status and counters.
    #[serde(default)]
    pub user_status: UserStatus,
    /// Untyped remainder of the dashboard payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DashboardData {
    /// Whether the dashboard exposes a non-empty mobile search counter.
    #[must_use]
    pub fn has_mobile_search_counter(&self) -> bool {
        self.user_status
            .counters
            .mobile_search
            .as_ref()
            .is_some_and(|counters| !counters.is_empty())
    }
}

/// Points earnable through the browser today.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserEarnablePoints {
    /// Desktop search points left.
    pub desktop_search_points: u64,
    /// Mobile search points left.
    pub mobile_search_points: u64,
    /// Daily set points left.
    pub daily_set_points: u64,
    /// "More promotions" points left.
    pub more_promotions_points: u64,
}

impl BrowserEarnablePoints {
    /// Points the desktop persona can still collect.
    #[must_use]
    pub fn desktop_total(&self) -> u64 {
        self.daily_set_points
            .saturating_add(self.desktop_search_points)
            .saturating_add(self.more_promotions_points)
    }
}

/// Points earnable through the mobile app today.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppEarnablePoints {
    /// Read-to-earn points left.
    pub read_to_earn: u64,
    /// Daily check-in points left.
    pub check_in: u64,
    /// Sum of all app points left.
    pub total_earnable_points: u64,
}

/// Server-reported search progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchPoints {
    /// Desktop search counters.
    pub pc_search: Vec<CounterProgress>,
    /// Mobile search counters.
    pub mobile_search: Vec<CounterProgress>,
}

impl SearchPoints {
    /// Mobile-search points still left, if the server reports a counter.
    #[must_use]
    pub fn mobile_remaining(&self) -> Option<i64> {
        self.mobile_search.first().map(CounterProgress::remaining)
    }
}

/// Point bookkeeping for one persona-run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointSnapshot {
    /// Balance when the dashboard was first fetched.
    pub initial_points: i64,
    /// Points the persona could still earn at dashboard time.
    pub earnable_points: u64,
    /// Balance after the task sequence, once fetched.
    pub current_points: Option<i64>,
}

impl PointSnapshot {
    /// Seed a snapshot from the dashboard balance.
    #[must_use]
    pub fn seeded(initial_points: i64) -> Self {
        Self {
            initial_points,
            ..Self::default()
        }
    }

    /// Points collected during the run, once the final balance is known.
    #[must_use]
    pub fn collected(&self) -> Option<i64> {
        self.current_points
            .map(|current| current - self.initial_points)
    }
}
