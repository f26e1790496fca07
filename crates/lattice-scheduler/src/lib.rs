//! Placement and liveness driving for the Lattice controller.

pub mod placer;
pub mod reaper;

pub use placer::Placer;
pub use reaper::Reaper;
