//! Process signalling utilities.
//!
//! Liveness probes and termination for processes identified only by PID,
//! which is how a supervisor instance is seen from another invocation.

use std::time::Duration;

/// Number of liveness polls after SIGTERM before escalating to SIGKILL.
pub const STOP_POLL_ATTEMPTS: u32 = 10;

/// Interval between liveness polls while waiting for a process to exit.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Check if a process is alive.
///
/// Sends signal 0, which performs the existence and permission checks
/// without delivering anything.
pub fn is_alive(pid: libc::pid_t) -> bool {
    if pid <= 0 {
        return false;
    }
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Send SIGTERM to a process.
///
/// Returns true if the signal was sent successfully. Non-positive PIDs, which
/// would address a process group, are never signalled.
pub fn terminate(pid: libc::pid_t) -> bool {
    if pid <= 0 {
        return false;
    }
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

/// Send SIGKILL to a process.
///
/// Returns true if the signal was sent successfully.
pub fn kill(pid: libc::pid_t) -> bool {
    if pid <= 0 {
        return false;
    }
    unsafe { libc::kill(pid, libc::SIGKILL) == 0 }
}

/// How a process ended after [`stop_process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited within the grace period.
    Exited,
    /// Still alive after the grace period and sent SIGKILL.
    Killed,
}

/// Gracefully stop a process that is not our child.
///
/// 1. Sends SIGTERM
/// 2. Polls liveness `attempts` times, sleeping `interval` between polls
/// 3. If still running, sends SIGKILL
///
/// Returns an error if `pid` is not a single process or SIGTERM could not
/// be delivered.
pub fn stop_process(
    pid: libc::pid_t,
    attempts: u32,
    interval: Duration,
) -> std::io::Result<StopOutcome> {
    if pid <= 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("refusing to signal pid {}", pid),
        ));
    }

    // Send SIGTERM
    if !terminate(pid) {
        return Err(std::io::Error::last_os_error());
    }

    // Wait for graceful exit
    for _ in 0..attempts {
        if !is_alive(pid) {
            return Ok(StopOutcome::Exited);
        }
        std::thread::sleep(interval);
    }

    if !is_alive(pid) {
        return Ok(StopOutcome::Exited);
    }

    // Force kill
    tracing::debug!(pid, "SIGTERM timeout, sending SIGKILL");
    kill(pid);
    Ok(StopOutcome::Killed)
}
