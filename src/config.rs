//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Per-sub-task enable flags.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[allow(clippy::struct_excessive_bools)] // One switch per sub-task.
pub struct WorkerToggles {
    /// Complete the daily set.
    #[serde(default = "default_true")]
    pub do_daily_set: bool,
    /// Complete the "more promotions" activities.
    #[serde(default = "default_true")]
    pub do_more_promotions: bool,
    /// Complete punch cards.
    #[serde(default = "default_true")]
    pub do_punch_cards: bool,
    /// Run desktop searches.
    #[serde(default = "default_true")]
    pub do_desktop_search: bool,
    /// Run the mobile-app daily check-in.
    #[serde(default = "default_true")]
    pub do_daily_check_in: bool,
    /// Run the mobile-app read-to-earn activity.
    #[serde(default = "default_true")]
    pub do_read_to_earn: bool,
    /// Run mobile searches (the only retried sub-task).
    #[serde(default = "default_true")]
    pub do_mobile_search: bool,
}

impl Default for WorkerToggles {
    fn default() -> Self {
        Self {
            do_daily_set: true,
            do_more_promotions: true,
            do_punch_cards: true,
            do_desktop_search: true,
            do_daily_check_in: true,
            do_read_to_earn: true,
            do_mobile_search: true,
        }
    }
}

/// Search behaviour settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SearchSettings {
    /// Maximum number of full-session retries for an incomplete mobile search.
    #[serde(default = "default_retry_mobile_search_amount")]
    pub retry_mobile_search_amount: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            retry_mobile_search_amount: default_retry_mobile_search_amount(),
        }
    }
}

/// Log-quiescence monitor configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LivenessConfig {
    /// Whether the monitor runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Window without any log event after which the process counts as stalled.
    #[serde(default = "default_quiescence_seconds")]
    pub quiescence_seconds: u64,
    /// Take the fatal exit path when a stall is detected.
    #[serde(default = "default_true")]
    pub terminate_on_stall: bool,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quiescence_seconds: default_quiescence_seconds(),
            terminate_on_stall: true,
        }
    }
}

impl LivenessConfig {
    /// Silent window after which the process counts as stalled.
    #[must_use]
    pub fn quiescence_window(&self) -> Duration {
        Duration::from_secs(self.quiescence_seconds)
    }
}

/// External automation host process settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HostConfig {
    /// Host binary that speaks the NDJSON automation protocol.
    pub command: String,
    /// Arguments passed to the host binary.
    #[serde(default)]
    pub args: Vec<String>,
    /// Time allowed for the host to print its ready line.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_seconds: u64,
    /// Upper bound on a single host request (searches can be slow).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_retry_mobile_search_amount() -> u32 {
    2
}

fn default_quiescence_seconds() -> u64 {
    1800
}

fn default_startup_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    600
}

fn default_clusters() -> u32 {
    1
}

fn default_session_path() -> PathBuf {
    PathBuf::from("sessions")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// JSON file holding the ordered account list.
    pub accounts_path: PathBuf,
    /// Directory handed to the session-persistence collaborator.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
    /// Number of worker processes.
    #[serde(default = "default_clusters")]
    pub clusters: u32,
    /// Run desktop and mobile persona-runs of one account concurrently.
    #[serde(default)]
    pub parallel: bool,
    /// Keep going even when the dashboard reports nothing earnable.
    #[serde(default)]
    pub run_on_zero_points: bool,
    /// Per-sub-task switches.
    #[serde(default)]
    pub workers: WorkerToggles,
    /// Search behaviour.
    #[serde(default)]
    pub search_settings: SearchSettings,
    /// Log-quiescence monitor.
    #[serde(default)]
    pub liveness: LivenessConfig,
    /// Automation host process.
    pub host: HostConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Maximum number of mobile-search retries per account.
    #[must_use]
    pub fn max_mobile_search_retries(&self) -> u32 {
        self.search_settings.retry_mobile_search_amount
    }

    fn validate(&self) -> Result<()> {
        if self.clusters == 0 {
            return Err(AppError::Config(
                "clusters must be greater than zero".into(),
            ));
        }

        if self.liveness.quiescence_seconds == 0 {
            return Err(AppError::Config(
                "liveness.quiescence_seconds must be greater than zero".into(),
            ));
        }

        if self.host.command.trim().is_empty() {
            return Err(AppError::Config("host.command must not be empty".into()));
        }

        Ok(())
    }
}
