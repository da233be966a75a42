//! External automation host.
//!
//! Browser automation, login, and the individual point-earning tasks live
//! in a separate host process. This module starts that process and talks
//! to it over an NDJSON request/response protocol.

pub mod client;
pub mod spawner;
