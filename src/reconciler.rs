//! Per-share mount and unmount sequencing.
//!
//! Mounting is verify-then-start: a mount command that reports success is not
//! trusted until the mount point answers a listing, and only then is the
//! share's workload started. Teardown runs the other way round, stopping the
//! workload before the share disappears underneath it.

use crate::config::{ShareSpec, Timings};
use crate::error::{Error, Result};
use crate::mount::MountBackend;
use crate::workload::WorkloadBackend;
use std::path::Path;
use std::sync::Arc;

/// Drives a single share toward the mounted-and-healthy state.
pub struct ShareReconciler {
    mounts: Arc<dyn MountBackend>,
    workloads: Arc<dyn WorkloadBackend>,
    timings: Timings,
}

impl ShareReconciler {
    /// Create a reconciler over the given backends.
    pub fn new(
        mounts: Arc<dyn MountBackend>,
        workloads: Arc<dyn WorkloadBackend>,
        timings: Timings,
    ) -> Self {
        Self {
            mounts,
            workloads,
            timings,
        }
    }

    /// Timing configuration in use.
    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Whether the share's mount point is currently mounted.
    pub async fn is_mounted(&self, share: &ShareSpec) -> Result<bool> {
        self.mounts.is_mounted(Path::new(&share.local_path)).await
    }

    /// Whether the share's mount point answers a listing in time.
    pub async fn is_accessible(&self, share: &ShareSpec) -> bool {
        self.mounts
            .is_accessible(Path::new(&share.local_path), self.timings.probe_timeout)
            .await
    }

    /// Mount a share, verify it, and start its workload.
    ///
    /// An already mounted and accessible share is left untouched. A mounted
    /// but unresponsive share is unmounted and mounted afresh.
    pub async fn mount_share(&self, share: &ShareSpec) -> Result<()> {
        share.validate()?;

        let local_path = Path::new(&share.local_path);
        std::fs::create_dir_all(local_path)?;

        // Leave healthy mounts alone, tear down hung ones
        if self.is_mounted(share).await? {
            if self.is_accessible(share).await {
                tracing::debug!(
                    share = %share.display_name(),
                    path = %local_path.display(),
                    "share already mounted"
                );
                return Ok(());
            }

            tracing::warn!(
                share = %share.display_name(),
                path = %local_path.display(),
                "mounted share is not accessible, remounting"
            );
            if let Err(e) = self.unmount_share(share).await {
                tracing::warn!(share = %share.display_name(), error = %e, "unmount before remount failed");
            }
            tokio::time::sleep(self.timings.unmount_settle).await;
        }

        if share.delete_on_mount {
            clean_directory(local_path);
        }

        // Mount
        let output = self
            .mounts
            .mount(&share.server, &share.remote_path, local_path, &share.options)
            .await;
        if !output.success() {
            return Err(Error::mount(
                share.source(),
                &share.local_path,
                output.diagnostics(),
            ));
        }

        // Verify before trusting the mount
        tokio::time::sleep(self.timings.mount_settle).await;
        if !self.is_accessible(share).await {
            tracing::error!(
                share = %share.display_name(),
                path = %local_path.display(),
                "mount succeeded but share is not accessible"
            );
            if let Err(e) = self.unmount_share(share).await {
                tracing::warn!(share = %share.display_name(), error = %e, "unmount of inaccessible share failed");
            }
            return Err(Error::Inaccessible(share.local_path.clone()));
        }

        tracing::info!(
            share = %share.display_name(),
            source = %share.source(),
            path = %local_path.display(),
            "share mounted and verified"
        );

        // Start workload
        if let Some(workload) = &share.workload {
            self.workloads.start(workload).await?;
        }

        Ok(())
    }

    /// Stop a share's workload and force-unmount it.
    ///
    /// Unmounting a share that is not mounted succeeds without running the
    /// unmount command.
    pub async fn unmount_share(&self, share: &ShareSpec) -> Result<()> {
        if share.local_path.is_empty() {
            return Err(Error::IncompleteShare(share.display_name().to_string()));
        }

        // Stop workload first, best effort
        if let Some(workload) = &share.workload {
            if let Err(e) = self.workloads.stop(workload).await {
                tracing::warn!(share = %share.display_name(), error = %e, "failed to stop workload");
            }
        }

        let local_path = Path::new(&share.local_path);
        if !self.is_mounted(share).await? {
            tracing::debug!(path = %local_path.display(), "share not mounted");
            return Ok(());
        }

        let output = self.mounts.unmount(local_path).await;
        if !output.success() {
            return Err(Error::unmount(&share.local_path, output.diagnostics()));
        }

        tracing::info!(share = %share.display_name(), path = %local_path.display(), "share unmounted");
        Ok(())
    }
}

/// Remove everything inside `path`, keeping the directory itself.
///
/// Failures are logged per entry and never abort the sweep.
pub fn clean_directory(path: &Path) {
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read directory");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read directory entry");
                continue;
            }
        };

        let item = entry.path();
        let result = match entry.file_type() {
            Ok(kind) if kind.is_dir() => std::fs::remove_dir_all(&item),
            Ok(_) => std::fs::remove_file(&item),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!(path = %item.display(), error = %e, "failed to remove entry");
        }
    }

    tracing::info!(path = %path.display(), "directory cleaned");
}
