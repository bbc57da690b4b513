//! Restart command implementation.

use clap::Args;
use nfsmanager::config::Timings;
use nfsmanager::instance::{PidFile, StopResult};

use super::start::StartCmd;
use super::Context;

/// Stop the running instance, if any, then start.
#[derive(Args, Debug)]
pub struct RestartCmd {
    #[command(flatten)]
    pub start: StartCmd,
}

impl RestartCmd {
    /// Execute the restart command.
    pub fn run(self, ctx: &Context) -> nfsmanager::Result<()> {
        let pid_file = PidFile::new(&ctx.pid_file);

        match pid_file.stop_instance() {
            StopResult::NotRunning => {}
            StopResult::Stopped(pid) => {
                println!("Stopped running instance (PID: {})", pid);
                std::thread::sleep(Timings::default().restart_settle);
            }
            StopResult::Failed(pid) => {
                tracing::warn!(pid, "could not stop running instance");
                std::thread::sleep(Timings::default().restart_settle);
            }
        }

        self.start.run(ctx)
    }
}
