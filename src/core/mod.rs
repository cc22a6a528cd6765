//! Core data model.
//!
//! This module contains the plain values that flow through the engine:
//! - Commands, domain events and feedback
//! - The routing variant returned by command handlers
//! - Immutable state snapshots
//!
//! Nothing in this module performs I/O or holds shared mutable state.

mod message;
mod state;

pub use message::{
    BusEvent, Command, DomainEvent, EventMetadata, Feedback, FeedbackLevel, Outcome,
};
pub use state::{ClusterState, CoreState};
