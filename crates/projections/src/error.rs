//! Replay failures.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The log could not be read.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A replayed event did not decode into its domain type.
    #[error("Cannot decode {event_type} on stream {stream_id}: {source}")]
    Decode {
        stream_id: AggregateId,
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
