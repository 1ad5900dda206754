//! Query side of the bank account core.
//!
//! Read models are fed two ways:
//! - live, as [`bus::HandleMessage`] recipients of raised domain events
//! - by replay, through a [`ProjectionProcessor`] reading the commit log
//!
//! Replay goes through whatever hooks wrap the log, so commits redacted by
//! a pipeline hook never reach a read model.

pub mod directory;
pub mod error;
pub mod processor;
pub mod projection;

pub use directory::{AccountEntry, CustomerDirectoryView, CustomerEntry};
pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition, ReadModel};
