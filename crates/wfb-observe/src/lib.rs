//! Logging for the wfbench workspace.
//!
//! Library crates only emit `tracing` events under `wfb.*` targets; the
//! binary installs the subscriber once, before the supervisor starts.

mod logger;
pub use logger::{LoggerConfig, LoggerError, LoggerFormat, logger_init};
