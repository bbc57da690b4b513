//! Scripted fakes shared by unit tests.

use crate::command::{CommandOutput, CommandRunner};
use crate::config::{ShareSource, ShareSpec};
use crate::error::{Error, Result};
use crate::mount::MountBackend;
use crate::workload::WorkloadBackend;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Ordered record of side effects across fakes.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// Command runner that records invocations and replays canned output.
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    responses: Mutex<HashMap<String, CommandOutput>>,
}

impl ScriptedRunner {
    pub fn respond(&self, program: &str, output: CommandOutput) {
        self.responses.lock().insert(program.to_string(), output);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str], timeout: Option<Duration>) -> CommandOutput {
        let mut call = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(limit) = timeout {
            call.push_str(&format!(" timeout={}s", limit.as_secs()));
        }
        self.calls.lock().push(call);

        self.responses
            .lock()
            .get(program)
            .cloned()
            .unwrap_or_else(|| CommandOutput::exited(0, "", ""))
    }
}

#[derive(Default)]
struct MountTable {
    mounted: HashSet<PathBuf>,
    inaccessible: HashSet<PathBuf>,
    broken_queries: HashSet<PathBuf>,
    fail_mount: bool,
    fail_unmount: bool,
    inaccessible_after_mount: bool,
}

/// In-memory mount table.
pub struct FakeMounts {
    table: Mutex<MountTable>,
    events: EventLog,
}

impl FakeMounts {
    pub fn new(events: EventLog) -> Self {
        Self {
            table: Mutex::new(MountTable::default()),
            events,
        }
    }

    pub fn set_mounted(&self, path: &str, accessible: bool) {
        let mut table = self.table.lock();
        table.mounted.insert(PathBuf::from(path));
        if accessible {
            table.inaccessible.remove(Path::new(path));
        } else {
            table.inaccessible.insert(PathBuf::from(path));
        }
    }

    pub fn break_query(&self, path: &str) {
        self.table.lock().broken_queries.insert(PathBuf::from(path));
    }

    pub fn fail_mounts(&self) {
        self.table.lock().fail_mount = true;
    }

    pub fn fail_unmounts(&self) {
        self.table.lock().fail_unmount = true;
    }

    pub fn inaccessible_after_mount(&self) {
        self.table.lock().inaccessible_after_mount = true;
    }

    pub fn mounted(&self, path: &str) -> bool {
        self.table.lock().mounted.contains(Path::new(path))
    }
}

#[async_trait]
impl MountBackend for FakeMounts {
    async fn is_mounted(&self, path: &Path) -> Result<bool> {
        let table = self.table.lock();
        if table.broken_queries.contains(path) {
            return Err(Error::Io(std::io::Error::other("mount table unreadable")));
        }
        Ok(table.mounted.contains(path))
    }

    async fn is_accessible(&self, path: &Path, _timeout: Duration) -> bool {
        let table = self.table.lock();
        table.mounted.contains(path) && !table.inaccessible.contains(path)
    }

    async fn mount(
        &self,
        server: &str,
        remote_path: &str,
        local_path: &Path,
        options: &str,
    ) -> CommandOutput {
        self.events.push(format!(
            "mount {}:{} {} {}",
            server,
            remote_path,
            local_path.display(),
            options
        ));
        let mut table = self.table.lock();
        if table.fail_mount {
            return CommandOutput::exited(32, "", "mount.nfs: Connection timed out");
        }
        table.mounted.insert(local_path.to_path_buf());
        if table.inaccessible_after_mount {
            table.inaccessible.insert(local_path.to_path_buf());
        } else {
            table.inaccessible.remove(local_path);
        }
        CommandOutput::exited(0, "", "")
    }

    async fn unmount(&self, local_path: &Path) -> CommandOutput {
        self.events.push(format!("unmount {}", local_path.display()));
        let mut table = self.table.lock();
        if table.fail_unmount {
            return CommandOutput::exited(16, "", "umount.nfs: device is busy");
        }
        table.mounted.remove(local_path);
        table.inaccessible.remove(local_path);
        CommandOutput::exited(0, "", "")
    }
}

/// Workload backend that records start/stop requests.
pub struct FakeWorkloads {
    events: EventLog,
    fail_start: Mutex<bool>,
    fail_stop: Mutex<bool>,
}

impl FakeWorkloads {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            fail_start: Mutex::new(false),
            fail_stop: Mutex::new(false),
        }
    }

    pub fn fail_start(&self) {
        *self.fail_start.lock() = true;
    }

    pub fn fail_stop(&self) {
        *self.fail_stop.lock() = true;
    }
}

#[async_trait]
impl WorkloadBackend for FakeWorkloads {
    async fn start(&self, name: &str) -> Result<()> {
        self.events.push(format!("start {}", name));
        if *self.fail_start.lock() {
            return Err(Error::workload(name, "start", "no such container"));
        }
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.events.push(format!("stop {}", name));
        if *self.fail_stop.lock() {
            return Err(Error::workload(name, "stop", "no such container"));
        }
        Ok(())
    }
}

/// Share source returning a fixed list, or an error once broken.
pub struct StaticSource {
    shares: Mutex<Option<Vec<ShareSpec>>>,
}

impl StaticSource {
    pub fn new(shares: Vec<ShareSpec>) -> Self {
        Self {
            shares: Mutex::new(Some(shares)),
        }
    }

    pub fn break_source(&self) {
        *self.shares.lock() = None;
    }
}

impl ShareSource for StaticSource {
    fn load_shares(&self) -> Result<Vec<ShareSpec>> {
        self.shares.lock().clone().ok_or_else(|| Error::ConfigLoad {
            path: PathBuf::from("static"),
            reason: "source unavailable".to_string(),
        })
    }
}

/// A complete share mounted read-only from `nfs1`.
pub fn share(name: &str, local_path: impl AsRef<Path>, workload: Option<&str>) -> ShareSpec {
    ShareSpec {
        name: name.to_string(),
        server: "nfs1".to_string(),
        remote_path: format!("/export/{}", name),
        local_path: local_path.as_ref().to_string_lossy().into_owned(),
        options: "ro".to_string(),
        workload: workload.map(str::to_string),
        delete_on_mount: false,
    }
}
