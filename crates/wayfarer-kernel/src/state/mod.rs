//! Typed state model (spec.md §3).

mod trip_state;
pub mod types;

pub use trip_state::TripState;
pub use types::*;
