#![forbid(unsafe_code)]

//! Multi-account rewards task runner.
//!
//! Runs every configured account through a desktop and a mobile
//! persona-run, optionally fanned out over worker processes. Browser
//! automation itself lives in an external automation host reached over
//! NDJSON; see [`host`] and [`driver`].

pub mod config;
pub mod driver;
pub mod errors;
pub mod host;
pub mod ipc;
pub mod models;
pub mod network;
pub mod orchestrator;
pub mod supervisor;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
