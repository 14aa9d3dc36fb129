//! Turn lifecycle tracking
//!
//! Implements the turn state machine as a pure transition function plus a
//! per-session tracker that owns the turn states and the active-turn pointer.

pub mod state;
mod tracker;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use state::{TurnState, TurnStatus, TURN_SUPERSEDED};
pub use tracker::TurnTracker;
pub use transition::{transition, TurnTransitionError};
