//! Capabilities a recipient declares per exact message type.
//!
//! A type implements one trait per message it reacts to. The registry only
//! accepts a declaration when the matching trait is implemented, so a
//! recipient is never handed a message it cannot handle.

use async_trait::async_trait;
use common::Message;

use crate::{Bus, BusError, SagaStatus};

/// A saga that a message of type `M` starts.
///
/// Starting always activates the correlation named by
/// `message.correlation_id()`, even if it ran before.
#[async_trait]
pub trait StartedBy<M: Message>: Send + Sync + 'static {
    /// Handles the starting message and reports the saga's new status.
    async fn start(&self, message: &M, bus: &Bus) -> Result<SagaStatus, BusError>;
}

/// A saga that a message of type `M` continues.
///
/// Only invoked while the correlation is running; otherwise the message is
/// dropped without error.
#[async_trait]
pub trait ContinuedBy<M: Message>: Send + Sync + 'static {
    /// Handles the continuation and reports the saga's new status.
    async fn handle(&self, message: &M, bus: &Bus) -> Result<SagaStatus, BusError>;
}

/// A stateless recipient of messages of type `M`.
#[async_trait]
pub trait HandleMessage<M: Message>: Send + Sync + 'static {
    async fn handle(&self, message: &M, bus: &Bus) -> Result<(), BusError>;
}
