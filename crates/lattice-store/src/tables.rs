//! Fleet schema: the tables and secondary indexes of the store.

use crate::table::{IndexSpec, Row, Table};
use lattice_core::agent::Agent;
use lattice_core::ids::{AgentId, SessionId};
use lattice_core::session::Session;

/// Secondary index over an entity's lifecycle state.
pub const STATE_INDEX: &str = "state";
/// Secondary index over an entity's last-mutation timestamp.
pub const LAST_UPDATED_INDEX: &str = "last_updated";

impl Row for Agent {
    type Key = AgentId;

    fn key(&self) -> AgentId {
        self.id
    }
}

impl Row for Session {
    type Key = SessionId;

    fn key(&self) -> SessionId {
        self.id
    }
}

pub fn agents_table() -> Table<Agent> {
    Table::new(vec![
        IndexSpec {
            name: STATE_INDEX,
            key_of: |agent: &Agent| agent.state.as_index(),
        },
        IndexSpec {
            name: LAST_UPDATED_INDEX,
            key_of: |agent: &Agent| agent.last_updated,
        },
    ])
}

pub fn sessions_table() -> Table<Session> {
    Table::new(vec![
        IndexSpec {
            name: STATE_INDEX,
            key_of: |session: &Session| session.state.as_index(),
        },
        IndexSpec {
            name: LAST_UPDATED_INDEX,
            key_of: |session: &Session| session.last_updated,
        },
    ])
}

/// The whole fleet. Write transactions clone this wholesale; row storage
/// is shared until mutated.
#[derive(Clone)]
pub struct FleetState {
    pub agents: Table<Agent>,
    pub sessions: Table<Session>,
}

impl FleetState {
    pub fn new() -> Self {
        Self {
            agents: agents_table(),
            sessions: sessions_table(),
        }
    }
}

impl Default for FleetState {
    fn default() -> Self {
        Self::new()
    }
}
