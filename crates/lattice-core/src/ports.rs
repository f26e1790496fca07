//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the core domain and external
//! adapters.

use crate::agent::{Agent, AgentRegistration, AgentUpdate};
use crate::ids::{AgentId, SessionId};
use crate::session::{QueuedSession, Session, SessionGpu, SessionRequirements};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Authoritative store of fleet state.
///
/// Every mutation is atomic: both sides of the agent/session link are
/// written in a single transaction, so readers never observe a half-updated
/// placement. Lookups of missing ids fail with [`crate::Error::NotFound`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Admit an agent to the fleet and return its fresh id.
    async fn register_agent(&self, registration: AgentRegistration) -> Result<AgentId>;

    async fn get_agent(&self, id: AgentId) -> Result<Agent>;

    /// All agents, in unspecified order.
    async fn list_agents(&self) -> Result<Vec<Agent>>;

    /// Apply an agent heartbeat: refresh liveness and fold the reported
    /// session states into both sides of the placement link. Idempotent
    /// under replay; session entries unknown to the agent are ignored.
    async fn update_agent(&self, update: AgentUpdate) -> Result<()>;

    /// Queue a new session and return its fresh id.
    async fn request_session(&self, requirements: SessionRequirements) -> Result<SessionId>;

    async fn get_session(&self, id: SessionId) -> Result<Session>;

    /// All sessions, in unspecified order.
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    async fn get_queued_session(&self, id: SessionId) -> Result<QueuedSession>;

    /// Sessions still waiting for placement, in unspecified order.
    async fn list_queued_sessions(&self) -> Result<Vec<QueuedSession>>;

    /// Record a placement decision: move the session to assigned and charge
    /// the agent's capacity, atomically. Re-checks capacity inside the
    /// transaction and fails with [`crate::Error::CapacityExhausted`] when
    /// the agent lost the room since matching.
    async fn assign_session(
        &self,
        session_id: SessionId,
        agent_id: AgentId,
        gpus: Vec<SessionGpu>,
    ) -> Result<()>;

    /// Active agents with a free session slot, at least `min_vram` MiB of
    /// unreserved VRAM, all of `tags`, and no taint outside `tolerates`.
    /// The result is a snapshot copy; ordering is unspecified.
    async fn list_available_agents(
        &self,
        min_vram: u64,
        tags: &HashMap<String, String>,
        tolerates: &HashMap<String, String>,
    ) -> Result<Vec<Agent>>;

    /// Demote active agents not heard from within `not_updated_for` to
    /// missing.
    async fn mark_agents_missing(&self, not_updated_for: Duration) -> Result<()>;

    /// Delete missing agents not heard from within `not_updated_for`.
    async fn remove_missing_agents(&self, not_updated_for: Duration) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
