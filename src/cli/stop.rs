//! Stop command implementation.

use clap::Args;
use nfsmanager::instance::{PidFile, StopResult};

use super::Context;

/// Stop the running instance.
#[derive(Args, Debug)]
pub struct StopCmd {}

impl StopCmd {
    /// Execute the stop command.
    ///
    /// Not having an instance to stop is not an error.
    pub fn run(self, ctx: &Context) -> nfsmanager::Result<()> {
        let pid_file = PidFile::new(&ctx.pid_file);

        match pid_file.stop_instance() {
            StopResult::NotRunning => println!("No running instance"),
            StopResult::Stopped(pid) => println!("Stopped nfsmanager (PID: {})", pid),
            StopResult::Failed(pid) => tracing::warn!(pid, "could not stop running instance"),
        }
        Ok(())
    }
}
