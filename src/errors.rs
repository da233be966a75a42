//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Account list could not be read or is invalid.
    Accounts(String),
    /// Worker process spawn, chunk handoff, or exit accounting failure.
    Worker(String),
    /// Automation host protocol failure.
    Host(String),
    /// Browser session provider failure.
    Browser(String),
    /// Login or access-token acquisition failure.
    Auth(String),
    /// Dashboard or points lookup failure.
    Dashboard(String),
    /// Sub-task (daily set, search, ...) failure.
    Task(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Accounts(msg) => write!(f, "accounts: {msg}"),
            Self::Worker(msg) => write!(f, "worker: {msg}"),
            Self::Host(msg) => write!(f, "host: {msg}"),
            Self::Browser(msg) => write!(f, "browser: {msg}"),
            Self::Auth(msg) => write!(f, "auth: {msg}"),
            Self::Dashboard(msg) => write!(f, "dashboard: {msg}"),
            Self::Task(msg) => write!(f, "task: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Host(format!("malformed json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
