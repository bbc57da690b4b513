//! CLI command implementations.

use std::path::PathBuf;

pub mod restart;
pub mod start;
pub mod stop;

/// Paths shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// Share configuration file.
    pub config: PathBuf,
    /// PID file of the running instance.
    pub pid_file: PathBuf,
}
