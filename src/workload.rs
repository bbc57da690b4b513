//! Workload backend.
//!
//! A workload is a container that depends on a share. It is started once the
//! share is mounted and verified, and stopped before the share is unmounted.

use crate::command::CommandRunner;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Starts and stops containers by name.
#[async_trait]
pub trait WorkloadBackend: Send + Sync {
    /// Start the named workload.
    async fn start(&self, name: &str) -> Result<()>;

    /// Stop the named workload.
    async fn stop(&self, name: &str) -> Result<()>;
}

/// Workloads managed through the `docker` CLI.
pub struct DockerBackend {
    runner: Arc<dyn CommandRunner>,
}

impl DockerBackend {
    /// Create a docker backend.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn control(&self, action: &str, name: &str) -> Result<()> {
        let output = self.runner.run("docker", &[action, name], None).await;
        if output.success() {
            tracing::info!(workload = %name, action, "docker command succeeded");
            Ok(())
        } else {
            Err(Error::workload(name, action, output.diagnostics()))
        }
    }
}

#[async_trait]
impl WorkloadBackend for DockerBackend {
    async fn start(&self, name: &str) -> Result<()> {
        self.control("start", name).await
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.control("stop", name).await
    }
}
