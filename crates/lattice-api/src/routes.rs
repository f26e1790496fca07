//! API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers::{agents, health, sessions};
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(health::health))
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/agents", agent_routes())
        .nest("/sessions", session_routes())
}

fn agent_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(agents::list_agents).post(agents::register_agent))
        .route(
            "/{id}",
            get(agents::get_agent).put(agents::update_agent),
        )
}

fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(sessions::list_sessions).post(sessions::request_session),
        )
        .route("/{id}", get(sessions::get_session))
}
