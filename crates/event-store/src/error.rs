use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event log.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream head did not match the version the commit attempt expected.
    #[error(
        "Concurrency conflict on stream {stream_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        stream_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// A pre-commit hook declined the attempt; nothing was written.
    #[error("Commit to stream {stream_id} rejected by pipeline hook '{hook}'")]
    CommitRejected {
        stream_id: AggregateId,
        hook: &'static str,
    },

    /// A retraction named a commit that is not the head of its stream.
    #[error("Commit {commit_sequence} is not the head of stream {stream_id}")]
    NotStreamHead {
        stream_id: AggregateId,
        commit_sequence: Version,
    },

    /// The commit attempt is malformed (empty, mixed streams, gaps in versions).
    #[error("Invalid commit attempt: {0}")]
    InvalidAttempt(String),

    /// An envelope was built without one of its required fields.
    #[error("Invalid event envelope: missing {0}")]
    InvalidEnvelope(&'static str),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
