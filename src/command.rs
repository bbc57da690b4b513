//! External command execution.
//!
//! Every shell-out goes through [`CommandRunner`] so the mount and workload
//! backends can be exercised against scripted runners. Failures never surface
//! as errors here: timeouts, spawn failures and non-zero exits are all
//! captured in [`CommandOutput`] and the caller decides what they mean.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The process exited with this code (signals map to -1).
    Exited(i32),
    /// The timeout elapsed and the process was killed.
    TimedOut,
    /// The process could not be started.
    SpawnFailed,
}

/// Captured result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a process that exited normally.
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Exited(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Output of a command that exceeded its timeout.
    pub fn timed_out() -> Self {
        Self {
            status: CommandStatus::TimedOut,
            stdout: String::new(),
            stderr: "command timed out".to_string(),
        }
    }

    /// Output of a command that could not be spawned.
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::SpawnFailed,
            stdout: String::new(),
            stderr: reason.into(),
        }
    }

    /// Exit code, or -1 when the process did not exit on its own.
    pub fn code(&self) -> i32 {
        match self.status {
            CommandStatus::Exited(code) => code,
            CommandStatus::TimedOut | CommandStatus::SpawnFailed => -1,
        }
    }

    /// True if the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status == CommandStatus::Exited(0)
    }

    /// Trimmed stderr, for log lines and error messages.
    pub fn diagnostics(&self) -> String {
        self.stderr.trim().to_string()
    }
}

/// Executes external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, killing it if `timeout` elapses.
    async fn run(&self, program: &str, args: &[&str], timeout: Option<Duration>) -> CommandOutput;
}

/// Runs commands on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str], timeout: Option<Duration>) -> CommandOutput {
        tracing::debug!(program, ?args, ?timeout, "running command");

        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!(program, ?limit, "command timed out");
                    return CommandOutput::timed_out();
                }
            },
            None => child.await,
        };

        match result {
            Ok(output) => CommandOutput::exited(
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            ),
            Err(e) => CommandOutput::spawn_failed(e.to_string()),
        }
    }
}
