//! Session types.

use crate::ids::{AgentId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Queued,
    Assigned,
    Active,
    Closed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Closed | SessionState::Cancelled | SessionState::Failed
        )
    }

    /// Integer key used by the store's `state` index.
    pub fn as_index(&self) -> i64 {
        match self {
            SessionState::Queued => 0,
            SessionState::Assigned => 1,
            SessionState::Active => 2,
            SessionState::Closed => 3,
            SessionState::Cancelled => 4,
            SessionState::Failed => 5,
        }
    }
}

/// A single requested GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuRequest {
    /// Requested VRAM in MiB.
    pub vram: u64,
}

/// Constraints a session must be placed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequirements {
    pub version: String,
    pub gpus: Vec<GpuRequest>,
    /// Labels the hosting agent must carry.
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Agent taints this session tolerates.
    #[serde(default)]
    pub tolerates: HashMap<String, String>,
}

impl SessionRequirements {
    /// Sum of per-GPU VRAM requests, in MiB.
    pub fn total_vram(&self) -> u64 {
        self.gpus.iter().map(|gpu| gpu.vram).sum()
    }
}

/// A concrete GPU selection recorded at assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGpu {
    /// Index of the GPU within the agent's GPU list.
    pub index: u32,
    /// VRAM reserved on that GPU in MiB.
    pub vram: u64,
}

/// A client's virtual claim on agent resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    /// Client-declared software version, copied from the requirements.
    pub version: String,
    pub requirements: SessionRequirements,
    /// Sum over requested GPUs, in MiB. Immutable after creation.
    pub vram_required: u64,
    /// Set when assigned, empty while queued.
    pub agent_id: Option<AgentId>,
    /// Copied from the agent on assignment.
    pub address: Option<String>,
    /// Concrete GPU selections, set on assignment.
    #[serde(default)]
    pub gpus: Vec<SessionGpu>,
    /// Unix timestamp of the last mutation.
    pub last_updated: i64,
}

/// The slice of a queued session the placement driver needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedSession {
    pub id: SessionId,
    pub requirements: SessionRequirements,
}
