//! Start-up and driver errors.

use bus::BusError;
use command_store::CommandStoreError;
use event_store::EventStoreError;
use projections::ProjectionError;
use saga::SagaError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("command store error: {0}")]
    CommandStore(#[from] CommandStoreError),

    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("saga recovery failed: {0}")]
    Saga(#[from] SagaError),

    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("metrics recorder: {0}")]
    Metrics(String),
}

impl AppError {
    /// Whether the failure came from a retryable router error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Bus(e) if e.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{AggregateId, Version};

    #[test]
    fn conflict_from_bus_is_retryable() {
        let error = AppError::from(BusError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::initial(),
            actual: Version::first(),
        });
        assert!(error.is_retryable());
    }

    #[test]
    fn metrics_error_is_not_retryable() {
        assert!(!AppError::Metrics("already installed".into()).is_retryable());
    }
}
