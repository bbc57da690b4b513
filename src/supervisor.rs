//! Share supervisor for mount health monitoring and remounting.
//!
//! The supervisor re-reads the share list every cycle, checks each share in
//! order, and remounts any share that is missing or unresponsive. A failure on
//! one share is logged and never stops the rest of the cycle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::config::{ShareSource, ShareSpec};
use crate::reconciler::ShareReconciler;

/// Share supervisor.
pub struct Supervisor {
    source: Arc<dyn ShareSource>,
    reconciler: ShareReconciler,
    check_interval: Duration,
    last_known: Mutex<Vec<ShareSpec>>,
}

impl Supervisor {
    /// Create a new supervisor.
    pub fn new(source: Arc<dyn ShareSource>, reconciler: ShareReconciler) -> Self {
        let check_interval = reconciler.timings().check_interval;
        Self {
            source,
            reconciler,
            check_interval,
            last_known: Mutex::new(Vec::new()),
        }
    }

    /// Override the time between cycles.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Run the supervisor loop.
    ///
    /// Cycles until `shutdown` carries `true` (or its sender is dropped).
    /// Shutdown is observed between shares and during the waits between
    /// them, never in the middle of a mount or unmount.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        tracing::info!(interval = ?self.check_interval, "supervisor started");

        while !shutdown_requested(&shutdown) {
            self.check_shares(&shutdown).await;

            if !pause(self.check_interval, &shutdown).await {
                break;
            }
        }

        tracing::info!("supervisor shutting down");
    }

    /// Run one reconciliation cycle over every configured share.
    ///
    /// Stops early, between two shares, once `shutdown` carries `true`.
    pub async fn check_shares(&self, shutdown: &watch::Receiver<bool>) {
        let shares = match self.load_shares() {
            Some(shares) => shares,
            None => return,
        };

        for share in &shares {
            if let Err(e) = self.check_share(share, shutdown).await {
                tracing::error!(share = %share.display_name(), error = %e, "failed to check share");
            }

            if shutdown_requested(shutdown) {
                tracing::info!("shutdown requested, ending cycle early");
                break;
            }
        }
    }

    /// Check a single share and remount it if needed.
    async fn check_share(
        &self,
        share: &ShareSpec,
        shutdown: &watch::Receiver<bool>,
    ) -> crate::Result<()> {
        if share.local_path.is_empty() {
            return Err(crate::Error::IncompleteShare(
                share.display_name().to_string(),
            ));
        }

        // Healthy shares need nothing
        let mounted = self.reconciler.is_mounted(share).await?;
        let accessible = mounted && self.reconciler.is_accessible(share).await;

        if mounted && accessible {
            return Ok(());
        }

        tracing::info!(
            share = %share.display_name(),
            path = %share.local_path,
            mounted,
            accessible,
            "share needs attention"
        );

        // Drop the hung mount first
        let timings = *self.reconciler.timings();
        if mounted {
            tracing::info!(share = %share.display_name(), "unmounting inaccessible share");
            if let Err(e) = self.reconciler.unmount_share(share).await {
                tracing::warn!(share = %share.display_name(), error = %e, "failed to unmount share");
            }
            if !pause(timings.unmount_settle, shutdown).await {
                return Ok(());
            }
        }

        // Remount, backing off before the next share on failure
        if let Err(e) = self.reconciler.mount_share(share).await {
            tracing::error!(share = %share.display_name(), error = %e, "failed to remount share");
            pause(timings.retry_backoff, shutdown).await;
        }

        Ok(())
    }

    /// Unmount every share, in configuration order.
    ///
    /// Uses the freshest readable share list, falling back to the last list
    /// the supervisor loaded. Failures are logged and skipped.
    pub async fn unmount_all(&self) {
        let shares = self
            .load_shares()
            .unwrap_or_else(|| self.last_known.lock().clone());

        for share in &shares {
            if let Err(e) = self.reconciler.unmount_share(share).await {
                tracing::error!(share = %share.display_name(), error = %e, "failed to unmount share");
            }
        }
    }

    fn load_shares(&self) -> Option<Vec<ShareSpec>> {
        match self.source.load_shares() {
            Ok(shares) => {
                *self.last_known.lock() = shares.clone();
                Some(shares)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load share configuration");
                None
            }
        }
    }
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Sleep for `duration` unless shutdown is requested first.
///
/// Returns false if the wait was cut short by shutdown or a dropped sender.
async fn pause(duration: Duration, shutdown: &watch::Receiver<bool>) -> bool {
    if shutdown_requested(shutdown) {
        return false;
    }
    let mut shutdown = shutdown.clone();
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        changed = shutdown.changed() => changed.is_ok() && !shutdown_requested(&shutdown),
    }
}
