use std::time::Duration;

use common::{AggregateId, ParseStateError, Version};
use thiserror::Error;

/// Errors raised by the command-side persistence gateway.
#[derive(Debug, Error)]
pub enum CommandStoreError {
    /// The stored version is not the one the snapshot was derived from.
    #[error(
        "Concurrency conflict on aggregate {aggregate_id}: expected stored version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// An account references a customer that is not stored.
    #[error("Customer {customer_id} owning account {account_id} not found")]
    OwnerNotFound {
        account_id: AggregateId,
        customer_id: AggregateId,
    },

    /// The operation did not finish within the configured bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// A stored row carries a state the domain does not know.
    #[error("Corrupt stored state: {0}")]
    InvalidState(#[from] ParseStateError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl CommandStoreError {
    /// Returns true if resubmitting the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. } | Self::Timeout { .. })
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, CommandStoreError>;
