//! The in-memory `Storage` implementation.

use crate::db::Database;
use crate::table::StoreError;
use crate::tables::{FleetState, LAST_UPDATED_INDEX, STATE_INDEX};
use async_trait::async_trait;
use lattice_core::agent::{Agent, AgentRegistration, AgentState, AgentUpdate, PlacedSession};
use lattice_core::clock::{Clock, SystemClock};
use lattice_core::ids::{AgentId, SessionId};
use lattice_core::ports::Storage;
use lattice_core::session::{QueuedSession, Session, SessionGpu, SessionRequirements, SessionState};
use lattice_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Store(err.to_string())
    }
}

/// True when every key/value pair of `subset` appears in `superset`.
fn contains_all(superset: &HashMap<String, String>, subset: &HashMap<String, String>) -> bool {
    subset.iter().all(|(k, v)| superset.get(k) == Some(v))
}

/// In-memory fleet store. State lives only in process memory; a restart
/// loses it.
pub struct MemoryStore {
    db: Database<FleetState>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Database::new(FleetState::new()),
            clock,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn register_agent(&self, registration: AgentRegistration) -> Result<AgentId> {
        let now = self.clock.now();
        let vram_available = registration.gpus.iter().map(|gpu| gpu.vram).sum();
        let agent = Agent {
            id: AgentId::new(),
            state: AgentState::Active,
            address: registration.address,
            tags: registration.tags,
            taints: registration.taints,
            gpus: registration.gpus,
            max_sessions: registration.max_sessions,
            sessions: Vec::new(),
            vram_available,
            sessions_available: registration.max_sessions as i64,
            last_updated: now,
        };
        let id = agent.id;

        let mut txn = self.db.write();
        txn.agents.insert(agent);
        txn.commit();

        debug!(agent_id = %id, "agent registered");
        Ok(id)
    }

    async fn get_agent(&self, id: AgentId) -> Result<Agent> {
        let txn = self.db.read();
        txn.agents
            .first(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(id))
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        let txn = self.db.read();
        Ok(txn.agents.iter().cloned().collect())
    }

    async fn update_agent(&self, update: AgentUpdate) -> Result<()> {
        let now = self.clock.now();
        let mut txn = self.db.write();

        let mut agent = txn
            .agents
            .first(&update.id)
            .cloned()
            .ok_or_else(|| Error::not_found(update.id))?;

        // The heartbeat itself is liveness evidence.
        agent.state = AgentState::Active;
        agent.last_updated = now;

        // Rebuild the placement list from the agent's existing sessions.
        // Entries in the payload that the agent does not host are ignored,
        // which lets controller-initiated deletions converge.
        let mut kept = Vec::with_capacity(agent.sessions.len());
        for placed in std::mem::take(&mut agent.sessions) {
            let Some(&new_state) = update.sessions.get(&placed.id) else {
                kept.push(placed);
                continue;
            };

            let mut session = txn.sessions.first(&placed.id).cloned().ok_or_else(|| {
                Error::Store(format!(
                    "session {} placed on agent {} has no record",
                    placed.id, agent.id
                ))
            })?;
            session.state = new_state;
            session.last_updated = now;

            if new_state == SessionState::Closed {
                agent.vram_available += session.vram_required;
                agent.sessions_available += 1;
                txn.sessions.delete(&placed.id);
            } else {
                kept.push(PlacedSession {
                    id: placed.id,
                    state: new_state,
                });
                txn.sessions.insert(session);
            }
        }
        agent.sessions = kept;

        txn.agents.insert(agent);
        txn.commit();
        Ok(())
    }

    async fn request_session(&self, requirements: SessionRequirements) -> Result<SessionId> {
        let now = self.clock.now();
        let session = Session {
            id: SessionId::new(),
            state: SessionState::Queued,
            version: requirements.version.clone(),
            vram_required: requirements.total_vram(),
            requirements,
            agent_id: None,
            address: None,
            gpus: Vec::new(),
            last_updated: now,
        };
        let id = session.id;

        let mut txn = self.db.write();
        txn.sessions.insert(session);
        txn.commit();

        debug!(session_id = %id, "session queued");
        Ok(id)
    }

    async fn get_session(&self, id: SessionId) -> Result<Session> {
        let txn = self.db.read();
        txn.sessions
            .first(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(id))
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let txn = self.db.read();
        Ok(txn.sessions.iter().cloned().collect())
    }

    async fn get_queued_session(&self, id: SessionId) -> Result<QueuedSession> {
        let txn = self.db.read();
        txn.sessions
            .first(&id)
            .map(|session| QueuedSession {
                id: session.id,
                requirements: session.requirements.clone(),
            })
            .ok_or_else(|| Error::not_found(id))
    }

    async fn list_queued_sessions(&self) -> Result<Vec<QueuedSession>> {
        let txn = self.db.read();
        let result = txn
            .sessions
            .get(STATE_INDEX, SessionState::Queued.as_index())?
            .map(|session| QueuedSession {
                id: session.id,
                requirements: session.requirements.clone(),
            })
            .collect();
        Ok(result)
    }

    async fn assign_session(
        &self,
        session_id: SessionId,
        agent_id: AgentId,
        gpus: Vec<SessionGpu>,
    ) -> Result<()> {
        let now = self.clock.now();
        let mut txn = self.db.write();

        let mut agent = txn
            .agents
            .first(&agent_id)
            .cloned()
            .ok_or_else(|| Error::not_found(agent_id))?;
        let mut session = txn
            .sessions
            .first(&session_id)
            .cloned()
            .ok_or_else(|| Error::not_found(session_id))?;

        // The caller matched against a snapshot; re-check capacity under
        // the write lock so a concurrent assignment cannot overcommit.
        if agent.vram_available < session.vram_required || agent.sessions_available <= 0 {
            return Err(Error::CapacityExhausted {
                agent: agent_id,
                session: session_id,
            });
        }

        session.state = SessionState::Assigned;
        session.agent_id = Some(agent_id);
        session.address = Some(agent.address.clone());
        session.gpus = gpus;
        session.last_updated = now;

        agent.sessions.push(PlacedSession {
            id: session_id,
            state: SessionState::Assigned,
        });
        agent.vram_available -= session.vram_required;
        agent.sessions_available -= 1;
        agent.last_updated = now;

        txn.sessions.insert(session);
        txn.agents.insert(agent);
        txn.commit();

        debug!(session_id = %session_id, agent_id = %agent_id, "session assigned");
        Ok(())
    }

    async fn list_available_agents(
        &self,
        min_vram: u64,
        tags: &HashMap<String, String>,
        tolerates: &HashMap<String, String>,
    ) -> Result<Vec<Agent>> {
        let txn = self.db.read();
        let mut agents = Vec::new();
        for agent in txn.agents.get(STATE_INDEX, AgentState::Active.as_index())? {
            if agent.sessions_available > 0
                && agent.vram_available >= min_vram
                && contains_all(&agent.tags, tags)
                && contains_all(tolerates, &agent.taints)
            {
                agents.push(agent.clone());
            }
        }
        Ok(agents)
    }

    async fn mark_agents_missing(&self, not_updated_for: Duration) -> Result<()> {
        let now = self.clock.now();
        let since = now - not_updated_for.as_secs() as i64;
        let mut txn = self.db.write();

        let stale: Vec<Agent> = txn
            .agents
            .reverse_lower_bound(LAST_UPDATED_INDEX, since)?
            .filter(|agent| agent.state.is_active())
            .cloned()
            .collect();

        // Promoting resets last_updated, which moves the agent out of the
        // stale window and arms the removal threshold from this point.
        for mut agent in stale {
            warn!(agent_id = %agent.id, "agent stopped reporting, marking missing");
            agent.state = AgentState::Missing;
            agent.last_updated = now;
            txn.agents.insert(agent);
        }

        txn.commit();
        Ok(())
    }

    async fn remove_missing_agents(&self, not_updated_for: Duration) -> Result<()> {
        let now = self.clock.now();
        let since = now - not_updated_for.as_secs() as i64;
        let mut txn = self.db.write();

        let doomed: Vec<Agent> = txn
            .agents
            .reverse_lower_bound(LAST_UPDATED_INDEX, since)?
            .filter(|agent| agent.state == AgentState::Missing)
            .cloned()
            .collect();

        if doomed.is_empty() {
            txn.abort();
            return Ok(());
        }

        for agent in &doomed {
            // Fail any sessions the agent was still hosting so clients
            // observe the loss instead of a dangling placement.
            for placed in &agent.sessions {
                if let Some(mut session) = txn.sessions.first(&placed.id).cloned() {
                    session.state = SessionState::Failed;
                    session.agent_id = None;
                    session.address = None;
                    session.gpus.clear();
                    session.last_updated = now;
                    txn.sessions.insert(session);
                }
            }
            warn!(agent_id = %agent.id, sessions = agent.sessions.len(), "removing missing agent");
        }

        let removed = txn.agents.delete_all(doomed.iter().map(|agent| agent.id));
        txn.commit();

        debug!(removed, "stale agents removed");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
