//! Session handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lattice_core::ids::SessionId;
use lattice_core::session::{Session, SessionRequirements};
use serde::Serialize;
use std::sync::Arc;

use crate::handlers::error_response;
use crate::state::AppState;

#[derive(Serialize)]
pub struct RequestSessionResponse {
    pub id: String,
}

#[derive(Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<Session>,
    pub total: usize,
}

pub async fn request_session(
    State(state): State<Arc<AppState>>,
    Json(requirements): Json<SessionRequirements>,
) -> Result<Json<RequestSessionResponse>, (StatusCode, String)> {
    let id = state
        .storage
        .request_session(requirements)
        .await
        .map_err(error_response)?;

    Ok(Json(RequestSessionResponse { id: id.to_string() }))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, (StatusCode, String)> {
    let session_id: SessionId = id
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid session ID".to_string()))?;

    let session = state
        .storage
        .get_session(session_id)
        .await
        .map_err(error_response)?;

    Ok(Json(session))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListSessionsResponse>, (StatusCode, String)> {
    let sessions = state
        .storage
        .list_sessions()
        .await
        .map_err(error_response)?;

    Ok(Json(ListSessionsResponse {
        total: sessions.len(),
        sessions,
    }))
}
