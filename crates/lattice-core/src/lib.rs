//! Lattice Core
//!
//! Core domain types, traits, and error handling for the Lattice GPU fleet
//! controller. This crate has minimal dependencies and defines the shared
//! vocabulary used across all other crates.

pub mod agent;
pub mod clock;
pub mod error;
pub mod ids;
pub mod ports;
pub mod session;

pub use error::{Error, Result};
pub use ids::*;
