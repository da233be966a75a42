#![forbid(unsafe_code)]

//! `rewards-runner`: multi-account rewards task runner binary.
//!
//! Loads configuration, installs the process supervisor, and runs this
//! process's role (standalone, primary, or worker) to completion. Every
//! exit goes through the supervisor so the final code is always logged.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use rewards_runner::config::GlobalConfig;
use rewards_runner::orchestrator::dispatcher::WorkerDispatcher;
use rewards_runner::orchestrator::liveness::{ActivityLayer, ActivitySignal};
use rewards_runner::orchestrator::spawner::WorkerLaunch;
use rewards_runner::supervisor::{
    exit_process, fatal_exit, install_fault_handler, ProcessSupervisor,
};
use rewards_runner::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn as_arg(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "rewards-runner", about = "Multi-account rewards task runner", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Internal: run as worker `N` of a fan-out, reading the chunk from stdin.
    #[arg(long, hide = true)]
    worker_index: Option<usize>,
}

fn main() {
    let args = Cli::parse();
    let activity = ActivitySignal::new();

    if let Err(err) = init_tracing(args.log_format, activity.clone()) {
        eprintln!("{err}");
        std::process::exit(1);
    }
    install_fault_handler();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => fatal_exit("MAIN", &format!("failed to build tokio runtime: {err}")),
    };

    let code = runtime.block_on(run(args, activity));
    exit_process(code)
}

async fn run(args: Cli, activity: ActivitySignal) -> i32 {
    let config = match GlobalConfig::load_from_path(&args.config) {
        Ok(config) => Arc::new(config),
        Err(err) => fatal_exit("MAIN", &err.to_string()),
    };
    info!(path = %args.config.display(), "configuration loaded");

    let supervisor = ProcessSupervisor::new(config.liveness.clone(), activity.clone());
    supervisor.install_signal_handlers();

    let launch = match worker_launch(&args) {
        Ok(launch) => launch,
        Err(err) => fatal_exit("MAIN", &err.to_string()),
    };

    let dispatcher = WorkerDispatcher::new(config, launch, activity);
    supervisor.supervise(dispatcher.run(args.worker_index)).await
}

/// Workers re-run this binary with the same config and log format.
fn worker_launch(args: &Cli) -> Result<WorkerLaunch> {
    let program = std::env::current_exe()
        .map_err(|err| AppError::Worker(format!("cannot locate current executable: {err}")))?;

    Ok(WorkerLaunch {
        program,
        args: vec![
            OsString::from("--config"),
            args.config.clone().into_os_string(),
            OsString::from("--log-format"),
            OsString::from(args.log_format.as_arg()),
        ],
    })
}

fn init_tracing(log_format: LogFormat, activity: ActivitySignal) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(ActivityLayer::new(activity));

    match log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
