//! Error types for nfsmanager.

use std::path::PathBuf;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while supervising shares.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be read.
    #[error("failed to read config {path}: {reason}")]
    ConfigLoad {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// Configuration file is not valid JSON for the expected schema.
    #[error("invalid config {path}: {reason}")]
    ConfigParse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A share is missing one of its required fields.
    #[error("incomplete configuration for share '{0}'")]
    IncompleteShare(String),

    /// The mount command failed.
    #[error("mount of {source_spec} on {target} failed: {reason}")]
    Mount {
        /// `server:remote_path`.
        source_spec: String,
        /// Local mount point.
        target: String,
        /// Command diagnostics.
        reason: String,
    },

    /// The mount command succeeded but the mount point does not respond.
    #[error("mount on {0} succeeded but the share is not accessible")]
    Inaccessible(String),

    /// The unmount command failed.
    #[error("unmount of {target} failed: {reason}")]
    Unmount {
        /// Local mount point.
        target: String,
        /// Command diagnostics.
        reason: String,
    },

    /// A workload could not be started or stopped.
    #[error("workload {action} failed for '{name}': {reason}")]
    Workload {
        /// Workload identifier.
        name: String,
        /// `start` or `stop`.
        action: String,
        /// Command diagnostics.
        reason: String,
    },

    /// Another supervisor instance holds the PID file.
    #[error("an instance is already running (PID {0})")]
    AlreadyRunning(libc::pid_t),

    /// The PID file could not be written.
    #[error("failed to write PID file {path}: {reason}")]
    PidFile {
        /// Path of the PID file.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// Async runtime setup failed.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Create a mount error.
    pub fn mount(
        source_spec: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Mount {
            source_spec: source_spec.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create an unmount error.
    pub fn unmount(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unmount {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a workload error.
    pub fn workload(
        name: impl Into<String>,
        action: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Workload {
            name: name.into(),
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Create a PID file error.
    pub fn pid_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PidFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
