//! Error types for Lattice.

use crate::ids::{AgentId, SessionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A referenced entity does not exist. Surfaced to callers; never
    /// retried internally.
    #[error("not found: {0}")]
    NotFound(String),

    /// An agent lost the capacity for a session between matching and
    /// assignment. The placement driver retries with the next candidate.
    #[error("agent {agent} has no remaining capacity for session {session}")]
    CapacityExhausted { agent: AgentId, session: SessionId },

    /// Underlying index or schema failure. Fatal to the enclosing
    /// transaction; not expected in steady state.
    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Error::NotFound(id.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
