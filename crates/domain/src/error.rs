//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::account::AccountError;
use crate::customer::CustomerError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A customer rule was violated.
    #[error("Customer error: {0}")]
    Customer(#[from] CustomerError),

    /// An account rule was violated.
    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    /// An event could not be wrapped into an envelope.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if the error is a business-rule rejection rather than
    /// an infrastructure failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Customer(_) | Self::Account(_))
    }
}
