//! welld — the monitoring daemon's building blocks.
//!
//! The binary in `main.rs` only loads [`Config`], starts the [`Workers`]
//! and waits for a signal; everything else lives here so the CLI can share
//! the configuration.

pub mod config;
pub mod daemon;
pub mod shutdown;
pub mod vision;
pub mod worker;

pub use config::{Config, ConfigError};
pub use daemon::{spawn_scheduler, Workers};
pub use shutdown::{Shutdown, ShutdownClock};
pub use worker::{Worker, WorkerError};
