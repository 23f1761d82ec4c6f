//! Trait-only layer for the Wayfarer trip-planning workflow engine:
//! the graph runtime contract, the typed state model, and the
//! external-collaborator traits. Concrete implementations live in
//! `wayfarer-engine`.

pub mod collaborators;
pub mod error;
pub mod graph;
pub mod state;
pub mod telemetry;

pub use error::{KernelError, KernelResult};
pub use state::TripState;
