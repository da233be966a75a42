//! Worker fan-out.
//!
//! Decides whether this process runs the accounts itself, coordinates a
//! set of worker processes, or is one of those workers:
//!
//! | `clusters` | `--worker-index` | Role                                        |
//! |------------|------------------|---------------------------------------------|
//! | 1          | absent           | [`Role::Standalone`]: run every account here |
//! | > 1        | absent           | [`Role::Primary`]: chunk, spawn, count exits |
//! | > 1        | `i`              | [`Role::Worker`]: receive chunk `i`, run it  |
//!
//! The primary owns the [`WorkerExitTally`]; it is never shared with the
//! workers, which only see their own chunk.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::driver::host_driver::HostDriver;
use crate::driver::Collaborators;
use crate::host::spawner::spawn_host;
use crate::ipc::handoff::{receive_chunk, ChunkMessage};
use crate::models::account::{load_accounts, AccountCredential};
use crate::orchestrator::coordinator::AccountTaskCoordinator;
use crate::orchestrator::liveness::ActivitySignal;
use crate::orchestrator::session_runner::RunSettings;
use crate::orchestrator::spawner::{spawn_worker, WorkerExit, WorkerLaunch};
use crate::{AppError, Result};

/// What this process does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Single process, no fan-out.
    Standalone,
    /// Coordinating process of a worker fan-out.
    Primary,
    /// Subordinate worker with the given index.
    Worker {
        /// Zero-based worker index.
        index: usize,
    },
}

impl Role {
    /// Pick the role from the configured worker count and the CLI flag.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Worker` if a worker index is given while the
    /// configuration asks for a single process.
    pub fn resolve(clusters: u32, worker_index: Option<usize>) -> Result<Self> {
        match (clusters, worker_index) {
            (0 | 1, None) => Ok(Self::Standalone),
            (0 | 1, Some(index)) => Err(AppError::Worker(format!(
                "worker index {index} given but clusters is {clusters}"
            ))),
            (_, None) => Ok(Self::Primary),
            (_, Some(index)) => Ok(Self::Worker { index }),
        }
    }
}

/// How a process finished its share of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Standalone process ran every account.
    AllAccounts {
        /// Accounts processed.
        accounts: usize,
    },
    /// Primary saw every worker exit.
    WorkersDrained {
        /// Workers spawned.
        workers: usize,
    },
    /// Worker ran its chunk.
    ChunkDone {
        /// Worker index.
        index: usize,
        /// Accounts processed.
        accounts: usize,
    },
}

/// Split `items` into `min(workers, len)` contiguous chunks.
///
/// Chunks differ in size by at most one; the larger chunks come last.
/// Concatenating the chunks yields `items` unchanged.
#[must_use]
pub fn chunk_accounts<T: Clone>(items: &[T], workers: usize) -> Vec<Vec<T>> {
    let count = workers.min(items.len());
    if count == 0 {
        return Vec::new();
    }

    let base = items.len() / count;
    let remainder = items.len() % count;
    let mut chunks = Vec::with_capacity(count);
    let mut start = 0;

    for i in 0..count {
        let size = if i >= count - remainder { base + 1 } else { base };
        chunks.push(items[start..start + size].to_vec());
        start += size;
    }

    chunks
}

/// Count of worker processes that have not exited yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExitTally {
    active: usize,
}

impl WorkerExitTally {
    /// Tally starting at `workers` active processes.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self { active: workers }
    }

    /// Workers still running.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active
    }

    /// Whether every worker has exited.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.active == 0
    }

    /// Record one exit and return the remaining count.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Worker` if more exits arrive than workers exist.
    pub fn record_exit(&mut self) -> Result<usize> {
        self.active = self
            .active
            .checked_sub(1)
            .ok_or_else(|| AppError::Worker("exit reported after all workers exited".into()))?;
        Ok(self.active)
    }
}

/// Wait until every worker in `tally` has reported its exit.
///
/// # Errors
///
/// Returns `AppError::Worker` if the exit channel closes first.
pub async fn await_workers(
    mut exits: mpsc::Receiver<WorkerExit>,
    mut tally: WorkerExitTally,
) -> Result<Completion> {
    let workers = tally.active();

    while !tally.is_drained() {
        let Some(exit) = exits.recv().await else {
            return Err(AppError::Worker(format!(
                "exit channel closed with {} worker(s) still active",
                tally.active()
            )));
        };

        let active = tally.record_exit()?;
        warn!(
            tag = "MAIN-WORKER",
            index = exit.index,
            pid = exit.pid.unwrap_or(0),
            code = ?exit.code,
            active,
            "worker destroyed"
        );
    }

    warn!(tag = "MAIN-WORKER", "all workers destroyed, exiting main process");
    Ok(Completion::WorkersDrained { workers })
}

/// Runs this process's role to completion.
pub struct WorkerDispatcher {
    config: Arc<GlobalConfig>,
    launch: WorkerLaunch,
    activity: ActivitySignal,
}

impl WorkerDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>, launch: WorkerLaunch, activity: ActivitySignal) -> Self {
        Self {
            config,
            launch,
            activity,
        }
    }

    /// Run the role selected by `clusters` and `worker_index`.
    ///
    /// # Errors
    ///
    /// Returns the first hard failure of the role; the caller takes the
    /// fatal exit path.
    pub async fn run(&self, worker_index: Option<usize>) -> Result<Completion> {
        info!(tag = "MAIN", clusters = self.config.clusters, "bot started");

        match Role::resolve(self.config.clusters, worker_index)? {
            Role::Standalone => {
                let accounts = load_accounts(&self.config.accounts_path)?;
                let coordinator = self.connect().await?;
                let reports = coordinator.run_chunk(&accounts).await?;
                Ok(Completion::AllAccounts {
                    accounts: reports.len(),
                })
            }
            Role::Primary => {
                let accounts = load_accounts(&self.config.accounts_path)?;
                self.run_primary(&accounts).await
            }
            Role::Worker { index } => {
                self.run_worker(index, tokio::io::stdin())
                    .instrument(info_span!("worker", index))
                    .await
            }
        }
    }

    async fn run_primary(&self, accounts: &[AccountCredential]) -> Result<Completion> {
        info!(tag = "MAIN-PRIMARY", "primary process started");

        let workers = usize::try_from(self.config.clusters).unwrap_or(usize::MAX);
        let chunks = chunk_accounts(accounts, workers);
        let (exit_tx, exit_rx) = mpsc::channel(chunks.len().max(1));
        let tally = WorkerExitTally::new(chunks.len());

        for (index, accounts) in chunks.into_iter().enumerate() {
            let message = ChunkMessage { index, accounts };
            spawn_worker(
                &self.launch,
                &message,
                exit_tx.clone(),
                self.activity.clone(),
                tokio::io::stderr(),
            )
            .await?;
        }
        drop(exit_tx);

        await_workers(exit_rx, tally).await
    }

    /// Run as worker `index`: read the chunk from `chunk_source`, then run it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Worker` if no valid chunk arrives, or the first
    /// hard failure of the chunk run.
    pub async fn run_worker<R>(&self, index: usize, chunk_source: R) -> Result<Completion>
    where
        R: AsyncRead + Unpin,
    {
        die_with_parent();
        info!(tag = "MAIN-WORKER", pid = std::process::id(), "worker spawned");

        let chunk = receive_chunk(chunk_source).await?;
        if chunk.index != index {
            warn!(received = chunk.index, "chunk index does not match worker index");
        }

        let coordinator = self.connect().await?;
        let reports = coordinator.run_chunk(&chunk.accounts).await?;

        Ok(Completion::ChunkDone {
            index,
            accounts: reports.len(),
        })
    }

    async fn connect(&self) -> Result<AccountTaskCoordinator> {
        let host = spawn_host(&self.config.host).await?;
        let driver = Arc::new(HostDriver::new(host));
        Ok(AccountTaskCoordinator::new(
            Collaborators::from_driver(driver),
            RunSettings::from_config(&self.config),
        ))
    }
}

/// Ask the kernel to terminate this worker if the primary dies first.
#[cfg(target_os = "linux")]
fn die_with_parent() {
    use nix::sys::signal::Signal;

    if let Err(err) = nix::sys::prctl::set_pdeathsig(Signal::SIGTERM) {
        warn!(%err, "failed to set parent-death signal");
    }
}

#[cfg(not(target_os = "linux"))]
fn die_with_parent() {}
