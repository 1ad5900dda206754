use common::{AggregateId, Version};
use thiserror::Error;

/// Errors surfaced by registration and message delivery.
///
/// During a delivery, `ResolutionFailed` and `Handler` are isolated to the
/// recipient that raised them; every other variant aborts the delivery and
/// reaches the caller of `send`/`raise_event`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// A saga or handler does not satisfy its registration contract.
    #[error("Invalid registration of {type_name}: {reason}")]
    InvalidRegistration {
        type_name: &'static str,
        reason: String,
    },

    /// The resolver could not produce an instance of a recipient.
    #[error("Could not resolve {type_name}: {reason}")]
    ResolutionFailed {
        type_name: &'static str,
        reason: String,
    },

    /// The aggregate changed since the message was issued.
    #[error(
        "Concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// A domain rule rejected the message.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An account references a customer that does not exist.
    #[error("Customer {customer_id} owning account {account_id} not found")]
    OwnerNotFound {
        account_id: AggregateId,
        customer_id: AggregateId,
    },

    /// The targeted aggregate does not exist.
    #[error("{aggregate_type} {aggregate_id} not found")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// A pre-commit hook declined the write.
    #[error("Commit to {stream_id} rejected by '{hook}'")]
    CommitRejected {
        stream_id: AggregateId,
        hook: &'static str,
    },

    /// A persistence operation did not finish in time.
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    /// Any other persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A side recipient failed in a way that does not concern the caller.
    #[error("{recipient} failed: {reason}")]
    Handler {
        recipient: &'static str,
        reason: String,
    },
}

impl BusError {
    /// Returns true if resubmitting the message may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. } | Self::Timeout { .. })
    }

    /// Returns true if the failure stays with the recipient that raised it.
    pub fn is_isolated(&self) -> bool {
        matches!(self, Self::ResolutionFailed { .. } | Self::Handler { .. })
    }

    pub(crate) fn invalid_registration(type_name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRegistration {
            type_name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        let conflict = BusError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::initial(),
            actual: Version::first(),
        };
        assert!(conflict.is_retryable());
        assert!(!conflict.is_isolated());
        assert!(BusError::Timeout { operation: "save" }.is_retryable());
        assert!(!BusError::Validation("blank name".into()).is_retryable());
    }

    #[test]
    fn isolated_errors() {
        let resolution = BusError::ResolutionFailed {
            type_name: "Mailer",
            reason: "not registered".into(),
        };
        assert!(resolution.is_isolated());
        assert!(
            BusError::Handler {
                recipient: "Mailer",
                reason: "smtp down".into()
            }
            .is_isolated()
        );
        assert!(!BusError::Storage("disk".into()).is_isolated());
    }
}
