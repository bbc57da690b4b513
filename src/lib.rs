//! nfsmanager - keeps NFS shares mounted and their containers running.
//!
//! The supervisor reads a list of shares from a JSON file on every cycle,
//! verifies that each one is mounted and answers a directory listing, and
//! remounts those that are missing or hung. Shares may name a container that
//! is started once the share is healthy and stopped before it is unmounted.
//!
//! A single instance runs per host, guarded by a PID file.

pub mod command;
pub mod config;
pub mod daemon;
pub mod error;
pub mod instance;
pub mod mount;
pub mod paths;
pub mod process;
pub mod reconciler;
pub mod supervisor;
pub mod workload;

#[cfg(test)]
mod testutil;

pub use error::{Error, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
