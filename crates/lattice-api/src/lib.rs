//! HTTP API server for the Lattice controller.

pub mod handlers;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use routes::create_router;
pub use state::AppState;

/// Build the complete application router with middleware.
pub fn build_app(state: Arc<AppState>) -> Router {
    create_router(state).layer(TraceLayer::new_for_http())
}
