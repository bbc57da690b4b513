//! Single-instance guard.
//!
//! The running supervisor is identified by a PID file at a well-known path.
//! A PID file naming a dead process is stale and is removed on sight.

use crate::error::{Error, Result};
use crate::process::{self, StopOutcome, STOP_POLL_ATTEMPTS, STOP_POLL_INTERVAL};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result of asking a running instance to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopResult {
    /// No live instance held the PID file.
    NotRunning,
    /// The instance exited or was killed.
    Stopped(libc::pid_t),
    /// The instance could not be signalled.
    Failed(libc::pid_t),
}

/// PID file tracking the running supervisor.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create a handle for the PID file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the PID file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded PID, if the file exists and holds a number.
    pub fn read(&self) -> Option<libc::pid_t> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        contents.trim().parse().ok()
    }

    /// Whether a live supervisor owns the PID file.
    ///
    /// A file pointing at a dead process is removed. Unreadable or missing
    /// files count as "not running".
    pub fn is_running(&self) -> bool {
        if !self.path.exists() {
            return false;
        }
        let Some(pid) = self.read() else {
            return false;
        };
        if process::is_alive(pid) {
            return true;
        }

        tracing::info!(pid, path = %self.path.display(), "removing stale PID file");
        self.remove();
        false
    }

    /// Stop the live instance holding the PID file, if there is one.
    ///
    /// A stale PID file is removed without signalling anything.
    pub fn stop_instance(&self) -> StopResult {
        self.stop_instance_with(STOP_POLL_ATTEMPTS, STOP_POLL_INTERVAL)
    }

    fn stop_instance_with(&self, attempts: u32, interval: Duration) -> StopResult {
        if !self.is_running() {
            return StopResult::NotRunning;
        }
        let Some(pid) = self.read() else {
            return StopResult::NotRunning;
        };

        tracing::info!(pid, "stopping running instance");
        if self.stop_with(attempts, interval) {
            StopResult::Stopped(pid)
        } else {
            StopResult::Failed(pid)
        }
    }

    /// Stop the instance recorded in the PID file.
    ///
    /// Sends SIGTERM, polls once a second for up to ten seconds, then sends
    /// SIGKILL. Returns false if there was no PID file or the signal could
    /// not be delivered.
    pub fn stop_running_instance(&self) -> bool {
        self.stop_with(STOP_POLL_ATTEMPTS, STOP_POLL_INTERVAL)
    }

    fn stop_with(&self, attempts: u32, interval: Duration) -> bool {
        let Some(pid) = self.read() else {
            return false;
        };

        let stopped = match process::stop_process(pid, attempts, interval) {
            Ok(StopOutcome::Exited) => {
                tracing::info!(pid, "previous instance stopped");
                true
            }
            Ok(StopOutcome::Killed) => {
                tracing::warn!(pid, "previous instance did not exit, killed");
                true
            }
            Err(e) => {
                tracing::error!(pid, error = %e, "failed to stop previous instance");
                false
            }
        };

        self.remove();
        stopped
    }

    /// Claim the PID file for this process.
    ///
    /// Fails if a live instance already holds it or the file cannot be written.
    pub fn acquire(&self) -> Result<InstanceLock> {
        if self.is_running() {
            return Err(Error::AlreadyRunning(self.read().unwrap_or_default()));
        }
        self.write_own_pid()?;
        tracing::info!(path = %self.path.display(), "PID file written");
        Ok(InstanceLock {
            pid_file: self.clone(),
            released: false,
        })
    }

    /// Record the current process ID.
    pub fn write_own_pid(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::pid_file(&self.path, e.to_string()))?;
            }
        }
        std::fs::write(&self.path, std::process::id().to_string())
            .map_err(|e| Error::pid_file(&self.path, e.to_string()))
    }

    /// Delete the PID file, logging anything other than "not found".
    pub fn remove(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "PID file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to remove PID file")
            }
        }
    }
}

/// Ownership of the PID file; releasing it deletes the file.
///
/// Dropping an unreleased lock releases it.
#[derive(Debug)]
pub struct InstanceLock {
    pid_file: PidFile,
    released: bool,
}

impl InstanceLock {
    /// Remove the PID file. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // Leave the file alone if a newer instance has already replaced it.
        match self.pid_file.read() {
            Some(pid) if pid as u32 != std::process::id() => {
                tracing::warn!(pid, "PID file owned by another process, leaving it");
            }
            _ => self.pid_file.remove(),
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid_file(dir: &tempfile::TempDir) -> PidFile {
        PidFile::new(dir.path().join("run").join("nfsmanager.pid"))
    }

    #[test]
    fn test_not_running_without_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!pid_file(&dir).is_running());
    }

    #[test]
    fn test_stale_pid_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);
        std::fs::create_dir_all(pf.path().parent().unwrap()).unwrap();
        std::fs::write(pf.path(), "99999999").unwrap();

        assert!(!pf.is_running());
        assert!(!pf.path().exists());
    }

    #[test]
    fn test_garbage_pid_file_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);
        std::fs::create_dir_all(pf.path().parent().unwrap()).unwrap();
        std::fs::write(pf.path(), "not a pid").unwrap();

        assert!(!pf.is_running());
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);

        let mut lock = pf.acquire().unwrap();
        assert_eq!(pf.read(), Some(std::process::id() as libc::pid_t));
        assert!(pf.is_running());

        lock.release();
        assert!(!pf.path().exists());
        // Idempotent
        lock.release();
    }

    #[test]
    fn test_acquire_fails_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);
        let _lock = pf.acquire().unwrap();

        let err = pf.acquire().unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning(pid) if pid as u32 == std::process::id()));
    }

    #[test]
    fn test_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);
        {
            let _lock = pf.acquire().unwrap();
            assert!(pf.path().exists());
        }
        assert!(!pf.path().exists());
    }

    #[test]
    fn test_release_keeps_foreign_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);
        let mut lock = pf.acquire().unwrap();

        std::fs::write(pf.path(), "1").unwrap();
        lock.release();
        assert!(pf.path().exists());
    }

    #[test]
    fn test_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let pf = PidFile::new(blocker.join("nfsmanager.pid"));
        assert!(matches!(pf.acquire(), Err(Error::PidFile { .. })));
    }

    #[test]
    fn test_stop_without_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!pid_file(&dir).stop_running_instance());
    }

    #[test]
    fn test_stop_running_instance() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);
        std::fs::create_dir_all(pf.path().parent().unwrap()).unwrap();

        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        std::fs::write(pf.path(), child.id().to_string()).unwrap();
        let reaper = std::thread::spawn(move || child.wait());

        assert!(pf.stop_with(50, Duration::from_millis(20)));
        assert!(!pf.path().exists());
        assert!(reaper.join().unwrap().is_ok());
    }

    #[test]
    fn test_stop_instance_without_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);
        assert_eq!(pf.stop_instance(), StopResult::NotRunning);
        assert!(!pf.path().exists());
    }

    #[test]
    fn test_stop_instance_with_stale_or_unsafe_pid() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);
        std::fs::create_dir_all(pf.path().parent().unwrap()).unwrap();

        for contents in ["99999999", "0", "-1"] {
            std::fs::write(pf.path(), contents).unwrap();
            assert_eq!(pf.stop_instance(), StopResult::NotRunning, "{}", contents);
            assert!(!pf.path().exists(), "{}", contents);
        }
    }

    #[test]
    fn test_stop_instance_stops_live_process() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);
        std::fs::create_dir_all(pf.path().parent().unwrap()).unwrap();

        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as libc::pid_t;
        std::fs::write(pf.path(), pid.to_string()).unwrap();
        let reaper = std::thread::spawn(move || child.wait());

        assert_eq!(
            pf.stop_instance_with(50, Duration::from_millis(20)),
            StopResult::Stopped(pid)
        );
        assert!(!pf.path().exists());
        assert!(reaper.join().unwrap().is_ok());
    }

    #[test]
    fn test_stop_with_refuses_process_group_pid() {
        let dir = tempfile::tempdir().unwrap();
        let pf = pid_file(&dir);
        std::fs::create_dir_all(pf.path().parent().unwrap()).unwrap();
        std::fs::write(pf.path(), "0").unwrap();

        assert!(!pf.stop_running_instance());
        assert!(!pf.path().exists());
    }
}
