//! Protocol module - Core state machine and orchestration.
//!
//! This module provides the central state machine that runs every
//! Clearn operation atomically, the events it records and a scenario
//! runner for replaying whole user journeys.

pub mod events;
pub mod operations;
pub mod scenario;
pub mod state_machine;

pub use events::*;
pub use operations::*;
pub use scenario::*;
pub use state_machine::*;
