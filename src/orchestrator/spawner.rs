//! Worker process spawner.
//!
//! Re-executes the current binary as a worker, hands it its chunk over
//! stdin, relays its stderr log lines, and reports its exit on a channel.
//! Each relayed line counts as log activity for the primary's liveness
//! monitor, so a primary that only waits on workers is not mistaken for a
//! stalled one.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::ipc::codec::{is_framing_error, NdjsonCodec};
use crate::ipc::handoff::{send_chunk, ChunkMessage};
use crate::orchestrator::liveness::ActivitySignal;
use crate::{AppError, Result};

/// How to launch a worker: program plus the arguments every worker shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLaunch {
    /// Worker executable (normally the current binary).
    pub program: PathBuf,
    /// Arguments passed before `--worker-index`.
    pub args: Vec<OsString>,
}

/// Exit notification for one worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Zero-based worker index.
    pub index: usize,
    /// OS process id, if it was known.
    pub pid: Option<u32>,
    /// Exit code; `None` when killed by a signal or the wait failed.
    pub code: Option<i32>,
}

/// Spawn worker `message.index`, hand it `message`, and watch its exit.
///
/// The worker's stderr lines are relayed to `log_sink`. The exit monitor
/// is armed before the handoff, so a worker that dies early is still
/// reported on `exits`, after its last log line has been relayed.
///
/// # Errors
///
/// Returns `AppError::Worker` if the process cannot be spawned or its
/// pipes cannot be captured.
pub async fn spawn_worker<W>(
    launch: &WorkerLaunch,
    message: &ChunkMessage,
    exits: mpsc::Sender<WorkerExit>,
    activity: ActivitySignal,
    log_sink: W,
) -> Result<Option<u32>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let index = message.index;

    let mut cmd = Command::new(&launch.program);
    cmd.args(&launch.args)
        .arg("--worker-index")
        .arg(index.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Worker(format!("failed to spawn worker {index}: {err}")))?;
    let pid = child.id();

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Worker(format!("failed to capture worker {index} stdin")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Worker(format!("failed to capture worker {index} stderr")))?;

    info!(tag = "MAIN-WORKER", index, pid = pid.unwrap_or(0), "worker spawned");

    let relay = tokio::spawn(relay_logs(index, stderr, log_sink, activity));
    let _monitor = monitor_exit(index, pid, child, Some(relay), exits);

    if let Err(err) = send_chunk(stdin, message).await {
        warn!(index, %err, "chunk handoff failed; the worker exit will be reported");
    }

    Ok(pid)
}

/// Copy a worker's log lines to `sink` and record log activity.
pub async fn relay_logs<R, W>(index: usize, source: R, mut sink: W, activity: ActivitySignal)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = FramedRead::new(source, NdjsonCodec::new());

    while let Some(item) = lines.next().await {
        match item {
            Ok(mut line) => {
                activity.touch();
                line.push('\n');
                if let Err(err) = sink.write_all(line.as_bytes()).await {
                    debug!(index, %err, "log relay: sink closed, stopping");
                    return;
                }
            }
            Err(ref err) if is_framing_error(err) => {
                activity.touch();
                debug!(index, %err, "log relay: dropped an over-long line");
            }
            Err(err) => {
                debug!(index, %err, "log relay: stream error, stopping");
                return;
            }
        }
    }

    let _ = sink.flush().await;
}

/// Await the worker's exit and report it on `exits`.
///
/// When a log `relay` is given it is drained before the exit is sent.
#[must_use]
pub fn monitor_exit(
    index: usize,
    pid: Option<u32>,
    mut child: Child,
    relay: Option<JoinHandle<()>>,
    exits: mpsc::Sender<WorkerExit>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let code = match child.wait().await {
            Ok(status) => status.code(),
            Err(err) => {
                warn!(index, %err, "error waiting for worker process");
                None
            }
        };

        if let Some(relay) = relay {
            if let Err(err) = relay.await {
                warn!(index, %err, "worker log relay ended abnormally");
            }
        }

        if exits.send(WorkerExit { index, pid, code }).await.is_err() {
            warn!(index, "exit channel closed before the worker exit was delivered");
        }
    })
}
