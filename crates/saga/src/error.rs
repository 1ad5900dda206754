//! Saga error types.

use bus::BusError;
use command_store::CommandStoreError;
use common::AggregateId;
use domain::{AccountError, CustomerError, DomainError};
use event_store::EventStoreError;
use thiserror::Error;

/// Errors raised while a saga loads, changes and persists an aggregate.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A domain rule rejected the command, or an event could not be encoded.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The event log refused or failed the commit.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The command-side store refused or failed the save.
    #[error("Command store error: {0}")]
    CommandStore(#[from] CommandStoreError),

    /// The command targets an aggregate with no events.
    #[error("{aggregate_type} {aggregate_id} not found")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// The owning customer of an account is not stored.
    #[error("Customer {customer_id} owning account {account_id} not found")]
    OwnerNotFound {
        account_id: AggregateId,
        customer_id: AggregateId,
    },

    /// The events did not give the aggregate an identity.
    #[error("{aggregate_type} has no identity after applying its events")]
    Unidentified { aggregate_type: &'static str },
}

impl From<CustomerError> for SagaError {
    fn from(error: CustomerError) -> Self {
        Self::Domain(error.into())
    }
}

impl From<AccountError> for SagaError {
    fn from(error: AccountError) -> Self {
        Self::Domain(error.into())
    }
}

impl From<SagaError> for BusError {
    fn from(error: SagaError) -> Self {
        match error {
            SagaError::Domain(DomainError::EventStore(e)) | SagaError::EventStore(e) => e.into_bus(),
            SagaError::Domain(e) if e.is_validation() => BusError::Validation(e.to_string()),
            SagaError::Domain(e) => BusError::Storage(e.to_string()),
            SagaError::CommandStore(e) => e.into_bus(),
            SagaError::AggregateNotFound {
                aggregate_type,
                aggregate_id,
            } => BusError::AggregateNotFound {
                aggregate_type,
                aggregate_id,
            },
            SagaError::OwnerNotFound {
                account_id,
                customer_id,
            } => BusError::OwnerNotFound {
                account_id,
                customer_id,
            },
            e @ SagaError::Unidentified { .. } => BusError::Storage(e.to_string()),
        }
    }
}

trait IntoBusError {
    fn into_bus(self) -> BusError;
}

impl IntoBusError for EventStoreError {
    fn into_bus(self) -> BusError {
        match self {
            EventStoreError::ConcurrencyConflict {
                stream_id,
                expected,
                actual,
            } => BusError::ConcurrencyConflict {
                aggregate_id: stream_id,
                expected,
                actual,
            },
            EventStoreError::CommitRejected { stream_id, hook } => {
                BusError::CommitRejected { stream_id, hook }
            }
            other => BusError::Storage(other.to_string()),
        }
    }
}

impl IntoBusError for CommandStoreError {
    fn into_bus(self) -> BusError {
        match self {
            CommandStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            } => BusError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            },
            CommandStoreError::OwnerNotFound {
                account_id,
                customer_id,
            } => BusError::OwnerNotFound {
                account_id,
                customer_id,
            },
            CommandStoreError::Timeout { operation, .. } => BusError::Timeout { operation },
            other => BusError::Storage(other.to_string()),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
