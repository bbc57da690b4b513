//! Start command implementation.

use clap::Args;
use nfsmanager::command::{CommandRunner, SystemRunner};
use nfsmanager::config::{ConfigFile, JsonShareSource, Timings};
use nfsmanager::daemon::{self, Daemon};
use nfsmanager::instance::PidFile;
use nfsmanager::mount::NfsMountBackend;
use nfsmanager::reconciler::ShareReconciler;
use nfsmanager::supervisor::Supervisor;
use nfsmanager::workload::DockerBackend;
use nfsmanager::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::Context;

/// Parse a duration string (e.g., "30s", "5m", "1h").
fn parse_duration(s: &str) -> std::result::Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

/// Supervise the configured shares until signalled.
#[derive(Args, Debug)]
pub struct StartCmd {
    /// Time between reconciliation cycles (e.g., "60s", "5m").
    #[arg(long, default_value = "60s", value_parser = parse_duration)]
    pub interval: Duration,
}

impl StartCmd {
    /// Execute the start command.
    pub fn run(self, ctx: &Context) -> Result<()> {
        let pid_file = PidFile::new(&ctx.pid_file);
        if pid_file.is_running() {
            return Err(Error::AlreadyRunning(pid_file.read().unwrap_or_default()));
        }

        // A broken config is fatal at startup; later cycles only log it.
        let config = ConfigFile::load(&ctx.config)?;
        tracing::info!(
            config = %ctx.config.display(),
            shares = config.shares.len(),
            "configuration loaded"
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Runtime(e.to_string()))?;

        runtime.block_on(self.serve(ctx, pid_file))
    }

    async fn serve(self, ctx: &Context, pid_file: PidFile) -> Result<()> {
        let timings = Timings {
            check_interval: self.interval,
            ..Timings::default()
        };

        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let reconciler = ShareReconciler::new(
            Arc::new(NfsMountBackend::new(Arc::clone(&runner))),
            Arc::new(DockerBackend::new(runner)),
            timings,
        );
        let supervisor = Supervisor::new(Arc::new(JsonShareSource::new(&ctx.config)), reconciler);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        daemon::listen_for_shutdown(shutdown_tx)?;

        let mut daemon = Daemon::acquire(&pid_file, supervisor)?;
        daemon.run(shutdown_rx).await;

        tracing::info!("nfsmanager stopped");
        Ok(())
    }
}
