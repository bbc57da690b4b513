//! Mount backend.
//!
//! [`MountBackend`] is the reconciler's view of the host mount table. The
//! NFS implementation shells out to `mount`/`umount`/`ls` through a
//! [`CommandRunner`] and answers mount-point queries from the kernel mount
//! table, which never touches the (possibly hung) NFS path itself.

use crate::command::{CommandOutput, CommandRunner};
use crate::paths;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Mount-table operations needed by the reconciler.
#[async_trait]
pub trait MountBackend: Send + Sync {
    /// Whether `path` is currently a mount point.
    async fn is_mounted(&self, path: &Path) -> crate::Result<bool>;

    /// Whether `path` answers a directory listing within `timeout`.
    async fn is_accessible(&self, path: &Path, timeout: Duration) -> bool;

    /// Mount `server:remote_path` on `local_path`.
    async fn mount(
        &self,
        server: &str,
        remote_path: &str,
        local_path: &Path,
        options: &str,
    ) -> CommandOutput;

    /// Force-unmount `local_path`.
    async fn unmount(&self, local_path: &Path) -> CommandOutput;
}

/// NFS mounts via the host `mount` tooling.
pub struct NfsMountBackend {
    runner: Arc<dyn CommandRunner>,
    mount_table: PathBuf,
}

impl NfsMountBackend {
    /// Create a backend that reads the default mount table.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_mount_table(runner, paths::PROC_MOUNTS)
    }

    /// Create a backend reading mount points from `mount_table`.
    pub fn with_mount_table(runner: Arc<dyn CommandRunner>, mount_table: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            mount_table: mount_table.into(),
        }
    }
}

#[async_trait]
impl MountBackend for NfsMountBackend {
    async fn is_mounted(&self, path: &Path) -> crate::Result<bool> {
        let table = tokio::fs::read_to_string(&self.mount_table).await?;
        let mount_point = resolve_mount_point(path).await;
        Ok(mount_table_contains(&table, &mount_point))
    }

    async fn is_accessible(&self, path: &Path, timeout: Duration) -> bool {
        let path = path.to_string_lossy();
        self.runner.run("ls", &[&*path], Some(timeout)).await.success()
    }

    async fn mount(
        &self,
        server: &str,
        remote_path: &str,
        local_path: &Path,
        options: &str,
    ) -> CommandOutput {
        let source = format!("{}:{}", server, remote_path);
        let target = local_path.to_string_lossy();
        self.runner
            .run(
                "mount",
                &["-t", "nfs", source.as_str(), &*target, "-o", options],
                None,
            )
            .await
    }

    async fn unmount(&self, local_path: &Path) -> CommandOutput {
        let target = local_path.to_string_lossy();
        self.runner.run("umount", &["-f", &*target], None).await
    }
}

/// Resolve `path` to the form the kernel records in its mount table.
///
/// Only the parent directory is canonicalized, so symlinks and `..` on the
/// way to the mount point are followed but the mount root itself (which may
/// be a hung NFS export) is never stat-ed. A final component that is a
/// symlink is not followed. Falls back to the path as given when the parent
/// cannot be resolved.
pub async fn resolve_mount_point(path: &Path) -> PathBuf {
    let (parent, name) = match (path.parent(), path.components().next_back()) {
        (Some(parent), Some(Component::Normal(name))) => (parent, name),
        _ => {
            return tokio::fs::canonicalize(path)
                .await
                .unwrap_or_else(|_| path.to_path_buf())
        }
    };

    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    match tokio::fs::canonicalize(parent).await {
        Ok(parent) => parent.join(name),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cannot resolve mount point parent");
            path.to_path_buf()
        }
    }
}

/// Check whether `path` appears as a mount point in a `/proc/mounts` style table.
pub fn mount_table_contains(table: &str, path: &Path) -> bool {
    let wanted = normalize(path);
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|target| normalize(Path::new(&unescape_mount_field(target))) == wanted)
}

/// Decode the octal escapes (`\040` for space etc.) the kernel uses in mount tables.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Lexically normalize a path: drop `.` components and trailing slashes.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
