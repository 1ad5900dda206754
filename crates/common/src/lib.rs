//! Shared vocabulary for the command/event dispatch core.
//!
//! Every other crate in the workspace speaks in these types: aggregate
//! identities, versions, the closed set of aggregate states, and the
//! message contracts the bus dispatches on.

pub mod message;
pub mod state;
pub mod types;

pub use message::{Command, Event, Message};
pub use state::{AggregateState, ParseStateError};
pub use types::{AggregateId, Version};
