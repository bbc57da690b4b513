//! Supervisor instance lifecycle.
//!
//! A [`Daemon`] owns the instance lock for as long as it lives and walks the
//! lifecycle `NotStarted -> LockAcquired -> Running -> ShuttingDown ->
//! Stopped`. However the loop ends (shutdown signal, the loop returning, or a
//! panic inside it), cleanup runs before [`Daemon::run`] returns: the PID file
//! is removed and every configured share is unmounted.

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::instance::{InstanceLock, PidFile};
use crate::supervisor::Supervisor;

/// Lifecycle state of a supervisor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    LockAcquired,
    Running,
    ShuttingDown,
    Stopped,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::NotStarted => write!(f, "not-started"),
            LifecycleState::LockAcquired => write!(f, "lock-acquired"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::ShuttingDown => write!(f, "shutting-down"),
            LifecycleState::Stopped => write!(f, "stopped"),
        }
    }
}

/// A running supervisor instance holding the single-instance lock.
pub struct Daemon {
    supervisor: Arc<Supervisor>,
    lock: InstanceLock,
    state: LifecycleState,
    cleaned_up: bool,
}

impl Daemon {
    /// Acquire the instance lock and prepare to run `supervisor`.
    ///
    /// Fails if another live instance holds the PID file or the file cannot
    /// be written.
    pub fn acquire(pid_file: &PidFile, supervisor: Supervisor) -> Result<Self> {
        let lock = pid_file.acquire()?;
        let mut daemon = Self {
            supervisor: Arc::new(supervisor),
            lock,
            state: LifecycleState::NotStarted,
            cleaned_up: false,
        };
        daemon.transition(LifecycleState::LockAcquired);
        Ok(daemon)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Run the reconciliation loop until shutdown, then clean up.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) {
        self.transition(LifecycleState::Running);
        tracing::info!(pid = std::process::id(), "nfsmanager started");

        let supervisor = Arc::clone(&self.supervisor);
        let handle = tokio::spawn(async move { supervisor.run(shutdown).await });
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "supervisor loop aborted unexpectedly");
        }

        self.transition(LifecycleState::ShuttingDown);
        self.cleanup().await;
        self.transition(LifecycleState::Stopped);
    }

    /// Remove the PID file and unmount every share.
    ///
    /// Only the first call does any work.
    pub async fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        tracing::info!("cleaning up before shutdown");
        self.lock.release();
        self.supervisor.unmount_all().await;
    }

    fn transition(&mut self, next: LifecycleState) {
        tracing::debug!(from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
    }
}

/// Flip `shutdown` to `true` on the first SIGTERM or SIGINT.
///
/// Must be called from within a tokio runtime.
pub fn listen_for_shutdown(shutdown: watch::Sender<bool>) -> std::io::Result<JoinHandle<()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        let received = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal = received, "shutdown signal received");
        let _ = shutdown.send(true);
    }))
}
