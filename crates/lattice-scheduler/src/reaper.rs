//! Liveness reaper: drives agents through active -> missing -> removed.

use lattice_core::ports::Storage;
use lattice_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

/// Periodic task advancing the agent liveness state machine based on
/// heartbeat freshness.
pub struct Reaper {
    storage: Arc<dyn Storage>,
    tick: Duration,
    /// Active agents silent for this long become missing.
    missing_after: Duration,
    /// Missing agents silent for this much longer are deleted. Measured
    /// from promotion time, giving operators a visible "missing but not
    /// yet deleted" window.
    remove_after: Duration,
}

impl Reaper {
    pub fn new(
        storage: Arc<dyn Storage>,
        tick: Duration,
        missing_after: Duration,
        remove_after: Duration,
    ) -> Self {
        Self {
            storage,
            tick,
            missing_after,
            remove_after,
        }
    }

    /// Run the reaper loop until shutdown. The shutdown signal is only
    /// observed between ticks, never mid-transaction.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.tick);

        info!(
            tick_secs = self.tick.as_secs(),
            missing_after_secs = self.missing_after.as_secs(),
            remove_after_secs = self.remove_after.as_secs(),
            "starting reaper"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick_once().await {
                        error!(error = %e, "reaper pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("reaper shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One reaper pass: demote stale active agents, then delete the ones
    /// that stayed missing.
    pub async fn tick_once(&self) -> Result<()> {
        self.storage.mark_agents_missing(self.missing_after).await?;
        self.storage.remove_missing_agents(self.remove_after).await
    }
}
