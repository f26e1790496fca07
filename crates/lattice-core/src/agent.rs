//! Agent types.

use crate::ids::{AgentId, SessionId};
use crate::session::SessionState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A GPU exposed by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gpu {
    pub index: u32,
    pub name: String,
    /// Total VRAM in MiB.
    pub vram: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Active,
    Missing,
}

impl AgentState {
    pub fn is_active(&self) -> bool {
        matches!(self, AgentState::Active)
    }

    /// Integer key used by the store's `state` index.
    pub fn as_index(&self) -> i64 {
        match self {
            AgentState::Active => 0,
            AgentState::Missing => 1,
        }
    }
}

/// A session currently placed on an agent, as mirrored in the agent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedSession {
    pub id: SessionId,
    pub state: SessionState,
}

/// An agent registered with the controller.
///
/// `sessions` is a denormalized copy of the sessions placed on this agent;
/// every mutation that changes placement updates both sides in the same
/// store transaction. `vram_available` and `sessions_available` are derived
/// counters maintained under the same discipline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub state: AgentState,
    /// Network endpoint where clients reach placed sessions.
    pub address: String,
    /// Agent-declared labels a session may require.
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Agent-declared constraints a session must explicitly tolerate.
    #[serde(default)]
    pub taints: HashMap<String, String>,
    pub gpus: Vec<Gpu>,
    pub max_sessions: u32,
    pub sessions: Vec<PlacedSession>,
    /// Total VRAM in MiB not reserved by placed sessions.
    pub vram_available: u64,
    /// `max_sessions` minus the number of placed sessions.
    pub sessions_available: i64,
    /// Unix timestamp of the last mutation.
    pub last_updated: i64,
}

impl Agent {
    /// Sum of total VRAM over all GPUs, in MiB.
    pub fn total_vram(&self) -> u64 {
        self.gpus.iter().map(|gpu| gpu.vram).sum()
    }
}

/// Payload an agent submits when it joins the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub address: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub taints: HashMap<String, String>,
    pub gpus: Vec<Gpu>,
    pub max_sessions: u32,
}

/// Heartbeat payload: the agent's state plus absolute state assignments for
/// the sessions it hosts. Absolute states (not deltas) keep replays
/// idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentUpdate {
    pub id: AgentId,
    pub state: AgentState,
    #[serde(default)]
    pub sessions: HashMap<SessionId, SessionState>,
}
