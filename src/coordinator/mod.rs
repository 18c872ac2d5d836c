// Transition orchestration across the flow and occupancy leaves.

pub mod transitions;

pub use transitions::{BlockUntil, TransitionCoordinator};
