//! nfsmanager CLI entry point.

use clap::{Parser, Subcommand};
use nfsmanager::paths;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

/// nfsmanager - keep NFS shares mounted and their containers running
#[derive(Parser, Debug)]
#[command(name = "nfsmanager")]
#[command(about = "Keep NFS shares mounted and their containers running")]
#[command(version)]
struct Cli {
    /// Share configuration file.
    #[arg(long, global = true, default_value = paths::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// PID file guarding against concurrent instances.
    #[arg(long, global = true, default_value = paths::DEFAULT_PID_FILE)]
    pid_file: PathBuf,

    /// Log file written alongside stdout.
    #[arg(long, global = true, default_value = paths::DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start supervising shares in the foreground.
    Start(cli::start::StartCmd),

    /// Stop the running instance.
    Stop(cli::stop::StopCmd),

    /// Stop the running instance, if any, and start a new one.
    Restart(cli::restart::RestartCmd),
}

fn main() {
    let cli = Cli::parse();

    init_logging(&cli.log_file);

    tracing::debug!(version = nfsmanager::VERSION, "starting nfsmanager");

    let ctx = cli::Context {
        config: cli.config,
        pid_file: cli.pid_file,
    };

    let result = match cli.command {
        Commands::Start(cmd) => cmd.run(&ctx),
        Commands::Stop(cmd) => cmd.run(&ctx),
        Commands::Restart(cmd) => cmd.run(&ctx),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
///
/// Logs go to stdout and, when it can be opened, to `log_file`.
fn init_logging(log_file: &Path) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nfsmanager=info"));

    let (file_layer, file_error) = match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!(path = %log_file.display(), error = %e, "cannot open log file, logging to stdout only");
    }
}
