//! Request handlers organized by resource.

pub mod agents;
pub mod health;
pub mod sessions;

use axum::http::StatusCode;
use lattice_core::Error;

/// Map a core error onto an HTTP response.
pub(crate) fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::CapacityExhausted { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
