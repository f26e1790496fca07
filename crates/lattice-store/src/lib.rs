//! In-memory transactional store for the Lattice controller.
//!
//! The store is a snapshot database over a schema of multi-index tables:
//! readers get a consistent snapshot and never block, writers are
//! serialized and publish atomically on commit. [`MemoryStore`] layers the
//! fleet operations (registration, heartbeats, placement, reaping) on top.

pub mod db;
pub mod memory;
pub mod table;
pub mod tables;

pub use db::{Database, ReadTransaction, WriteTransaction};
pub use memory::MemoryStore;
pub use table::{IndexSpec, Row, StoreError, Table};
pub use tables::FleetState;
