//! Agent handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lattice_core::agent::{Agent, AgentRegistration, AgentState, AgentUpdate};
use lattice_core::ids::{AgentId, SessionId};
use lattice_core::session::SessionState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::handlers::error_response;
use crate::state::AppState;

#[derive(Serialize)]
pub struct RegisterAgentResponse {
    pub id: String,
}

#[derive(Serialize)]
pub struct ListAgentsResponse {
    pub agents: Vec<Agent>,
    pub total: usize,
}

/// Heartbeat body; the agent id comes from the path.
#[derive(Deserialize)]
pub struct UpdateAgentRequest {
    pub state: AgentState,
    #[serde(default)]
    pub sessions: HashMap<SessionId, SessionState>,
}

pub async fn register_agent(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<AgentRegistration>,
) -> Result<Json<RegisterAgentResponse>, (StatusCode, String)> {
    let id = state
        .storage
        .register_agent(registration)
        .await
        .map_err(error_response)?;

    Ok(Json(RegisterAgentResponse { id: id.to_string() }))
}

pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, (StatusCode, String)> {
    let agent_id: AgentId = id
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid agent ID".to_string()))?;

    let agent = state
        .storage
        .get_agent(agent_id)
        .await
        .map_err(error_response)?;

    Ok(Json(agent))
}

pub async fn list_agents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListAgentsResponse>, (StatusCode, String)> {
    let agents = state.storage.list_agents().await.map_err(error_response)?;

    Ok(Json(ListAgentsResponse {
        total: agents.len(),
        agents,
    }))
}

pub async fn update_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAgentRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let agent_id: AgentId = id
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid agent ID".to_string()))?;

    state
        .storage
        .update_agent(AgentUpdate {
            id: agent_id,
            state: request.state,
            sessions: request.sessions,
        })
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}
