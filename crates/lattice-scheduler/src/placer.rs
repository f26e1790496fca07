//! Placement of queued sessions onto eligible agents.

use lattice_core::agent::Agent;
use lattice_core::ports::Storage;
use lattice_core::session::{QueuedSession, SessionGpu, SessionRequirements};
use lattice_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Periodically drains the session queue, placing each queued session on
/// the first agent that satisfies its requirements.
pub struct Placer {
    storage: Arc<dyn Storage>,
    tick: Duration,
}

impl Placer {
    pub fn new(storage: Arc<dyn Storage>, tick: Duration) -> Self {
        Self { storage, tick }
    }

    /// Run the placement loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.tick);

        info!(tick_secs = self.tick.as_secs(), "starting placement driver");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.place_queued().await {
                        error!(error = %e, "placement pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("placement driver shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One pass over the queue. Returns the number of sessions placed;
    /// sessions with no eligible agent stay queued for the next pass.
    pub async fn place_queued(&self) -> Result<usize> {
        let queued = self.storage.list_queued_sessions().await?;
        let mut placed = 0;
        for session in queued {
            if self.place(&session).await? {
                placed += 1;
            }
        }
        if placed > 0 {
            debug!(placed, "placement pass complete");
        }
        Ok(placed)
    }

    async fn place(&self, session: &QueuedSession) -> Result<bool> {
        let requirements = &session.requirements;
        let candidates = self
            .storage
            .list_available_agents(
                requirements.total_vram(),
                &requirements.tags,
                &requirements.tolerates,
            )
            .await?;

        for agent in candidates {
            let Some(gpus) = select_gpus(&agent, requirements) else {
                continue;
            };
            match self.storage.assign_session(session.id, agent.id, gpus).await {
                Ok(()) => {
                    info!(session_id = %session.id, agent_id = %agent.id, "session placed");
                    return Ok(true);
                }
                // Lost the capacity race for this agent; try the next one.
                Err(Error::CapacityExhausted { .. }) => continue,
                // Session or agent vanished between matching and assigning.
                Err(Error::NotFound(_)) => return Ok(false),
                Err(err) => return Err(err),
            }
        }

        Ok(false)
    }
}

/// First-fit per-GPU VRAM selection over the agent's GPU list. Each request
/// takes the first GPU whose remaining budget covers it; returns `None`
/// when some request fits no GPU.
fn select_gpus(agent: &Agent, requirements: &SessionRequirements) -> Option<Vec<SessionGpu>> {
    let mut remaining: Vec<u64> = agent.gpus.iter().map(|gpu| gpu.vram).collect();
    let mut selections = Vec::with_capacity(requirements.gpus.len());

    for request in &requirements.gpus {
        let slot = remaining.iter().position(|&vram| vram >= request.vram)?;
        remaining[slot] -= request.vram;
        selections.push(SessionGpu {
            index: agent.gpus[slot].index,
            vram: request.vram,
        });
    }

    Some(selections)
}
