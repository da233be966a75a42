//! Automation host process spawner.
//!
//! Spawns the configured host binary with:
//! - `kill_on_drop(true)` so the host dies with its owner.
//! - `env_clear()` plus an allowlist, so unrelated secrets from our own
//!   environment are never visible to the host.
//! - A startup timeout: the host must print one ready line on stdout
//!   within `startup_timeout_seconds` or it is killed.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::info;

use crate::config::HostConfig;
use crate::host::client::HostClient;
use crate::{AppError, Result};

/// Environment variables inherited by the host process.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "RUST_LOG",
    "DISPLAY",
    "XDG_RUNTIME_DIR",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "APPDATA",
    "LOCALAPPDATA",
];

/// A running automation host and the client connected to it.
///
/// Dropping this kills the host process.
#[derive(Debug)]
pub struct HostProcess {
    /// Child handle, kept alive so `kill_on_drop` fires with us.
    pub child: Child,
    /// Request client bound to the host's stdio.
    pub client: HostClient,
}

/// Spawn the automation host and wait for its ready line.
///
/// # Errors
///
/// - `AppError::Host("failed to spawn host: …")` on OS spawn failure.
/// - `AppError::Host("startup timeout …")` when no ready line arrives in time.
/// - `AppError::Host("host exited before ready signal")` on early EOF.
pub async fn spawn_host(config: &HostConfig) -> Result<HostProcess> {
    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args);

    cmd.env_clear();
    for &key in ALLOWED_ENV_VARS {
        if let Ok(val) = std::env::var(key) {
            cmd.env(key, val);
        }
    }

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Host(format!("failed to spawn host: {err}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Host("failed to capture host stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Host("failed to capture host stdout".into()))?;

    let startup_timeout = Duration::from_secs(config.startup_timeout_seconds);
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();

    match tokio::time::timeout(startup_timeout, reader.read_line(&mut line)).await {
        Ok(Ok(n)) if n > 0 => {
            info!(
                pid = child.id().unwrap_or(0),
                ready_line = line.trim(),
                "automation host ready"
            );
        }
        Ok(Ok(_)) => {
            return Err(AppError::Host("host exited before ready signal".into()));
        }
        Ok(Err(err)) => {
            return Err(AppError::Host(format!(
                "failed to read host ready signal: {err}"
            )));
        }
        Err(_elapsed) => {
            child.kill().await.ok();
            return Err(AppError::Host(format!(
                "startup timeout: host did not emit ready signal within {startup_timeout:?}"
            )));
        }
    }

    let client = HostClient::start(
        reader,
        stdin,
        Duration::from_secs(config.request_timeout_seconds),
    );

    Ok(HostProcess { child, client })
}
