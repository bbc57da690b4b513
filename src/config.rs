//! Share configuration.
//!
//! The configuration file is a JSON object with a `shares` array. It is
//! re-read on every reconciliation cycle, so edits take effect without a
//! restart.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Workload identifier meaning "no workload associated".
pub const NO_WORKLOAD: &str = "none";

/// One declared mount intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ShareSpec {
    /// Display name, used for logging only.
    #[serde(default)]
    pub name: String,

    /// NFS server host or address.
    #[serde(default)]
    pub server: String,

    /// Exported path on the server.
    #[serde(default)]
    pub remote_path: String,

    /// Local mount point.
    #[serde(default)]
    pub local_path: String,

    /// Mount options passed through to `mount -o`.
    #[serde(default)]
    pub options: String,

    /// Container started once the share is mounted and accessible.
    #[serde(rename = "docker", default, deserialize_with = "deserialize_workload")]
    pub workload: Option<String>,

    /// Clear the mount point directory before mounting.
    #[serde(default)]
    pub delete_on_mount: bool,
}

fn deserialize_workload<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|w| !w.is_empty() && w != NO_WORKLOAD))
}

impl ShareSpec {
    /// Name used in log lines; falls back to "unknown" like an unnamed entry.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "unknown"
        } else {
            &self.name
        }
    }

    /// `server:remote_path` as passed to the mount command.
    pub fn source(&self) -> String {
        format!("{}:{}", self.server, self.remote_path)
    }

    /// Check that every field required to mount is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            &self.server,
            &self.remote_path,
            &self.local_path,
            &self.options,
        ];
        if required.iter().any(|field| field.is_empty()) {
            return Err(Error::IncompleteShare(self.display_name().to_string()));
        }
        Ok(())
    }
}

/// On-disk configuration file layout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Shares in reconciliation order.
    #[serde(default)]
    pub shares: Vec<ShareSpec>,
}

impl ConfigFile {
    /// Parse a configuration document.
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read and parse the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(path, &contents)
    }
}

/// Supplies the ordered list of shares for each cycle.
pub trait ShareSource: Send + Sync {
    /// Load the current share list.
    fn load_shares(&self) -> Result<Vec<ShareSpec>>;
}

/// Share source backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonShareSource {
    path: PathBuf,
}

impl JsonShareSource {
    /// Create a source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ShareSource for JsonShareSource {
    fn load_shares(&self) -> Result<Vec<ShareSpec>> {
        Ok(ConfigFile::load(&self.path)?.shares)
    }
}

/// Fixed delays and timeouts governing reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Pause after unmounting before the next operation.
    pub unmount_settle: Duration,
    /// Pause after a successful mount before verifying access.
    pub mount_settle: Duration,
    /// Pause after a failed mount before moving to the next share.
    pub retry_backoff: Duration,
    /// Time between reconciliation cycles.
    pub check_interval: Duration,
    /// Upper bound on the accessibility probe.
    pub probe_timeout: Duration,
    /// Pause between stopping the old instance and starting on restart.
    pub restart_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            unmount_settle: Duration::from_secs(2),
            mount_settle: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(5),
            check_interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
            restart_settle: Duration::from_secs(2),
        }
    }
}

impl Timings {
    /// Timings with every delay set to zero.
    pub fn immediate() -> Self {
        Self {
            unmount_settle: Duration::ZERO,
            mount_settle: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            check_interval: Duration::ZERO,
            probe_timeout: Duration::from_secs(1),
            restart_settle: Duration::ZERO,
        }
    }
}
