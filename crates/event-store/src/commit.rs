//! Commit attempts and durable commits.
//!
//! A commit is the atomic unit of the log: every event in it belongs to one
//! stream and becomes visible together or not at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// Unique identifier of a commit, chosen by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(Uuid);

impl CommitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CommitId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A set of events a writer wants appended to one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitAttempt {
    pub commit_id: CommitId,
    pub stream_id: AggregateId,
    pub aggregate_type: String,
    /// Stream version the writer observed before producing these events.
    pub expected_version: Version,
    pub events: Vec<EventEnvelope>,
    pub headers: HashMap<String, serde_json::Value>,
}

impl CommitAttempt {
    /// Creates an attempt with a fresh commit id and no headers.
    pub fn new(
        stream_id: AggregateId,
        aggregate_type: impl Into<String>,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Self {
        Self {
            commit_id: CommitId::new(),
            stream_id,
            aggregate_type: aggregate_type.into(),
            expected_version,
            events,
            headers: HashMap::new(),
        }
    }

    /// Adds a header carried alongside the commit.
    pub fn with_header(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.headers.insert(key.into(), value);
        self
    }

    /// Stream version once this attempt is committed.
    pub fn resulting_version(&self) -> Version {
        Version::new(self.expected_version.as_i64() + self.events.len() as i64)
    }

    /// Checks the attempt is appendable: non-empty, single stream, and
    /// versions running `expected_version + 1, + 2, ...` without gaps.
    pub fn validate(&self) -> Result<()> {
        if self.events.is_empty() {
            return Err(EventStoreError::InvalidAttempt(
                "cannot commit an empty event list".to_string(),
            ));
        }

        let mut expected = self.expected_version;
        for event in &self.events {
            if event.aggregate_id != self.stream_id {
                return Err(EventStoreError::InvalidAttempt(format!(
                    "event {} belongs to stream {}, not {}",
                    event.event_id, event.aggregate_id, self.stream_id
                )));
            }
            if event.aggregate_type != self.aggregate_type {
                return Err(EventStoreError::InvalidAttempt(format!(
                    "event {} has aggregate type {}, not {}",
                    event.event_id, event.aggregate_type, self.aggregate_type
                )));
            }
            expected = expected.next();
            if event.version != expected {
                return Err(EventStoreError::InvalidAttempt(format!(
                    "event versions must be sequential: expected {}, got {}",
                    expected, event.version
                )));
            }
        }

        Ok(())
    }

    /// Turns the attempt into a durable commit at the given global position.
    pub fn into_commit(self, checkpoint: i64, committed_at: DateTime<Utc>) -> Commit {
        let commit_sequence = self.resulting_version();
        Commit {
            commit_id: self.commit_id,
            stream_id: self.stream_id,
            aggregate_type: self.aggregate_type,
            commit_sequence,
            checkpoint,
            committed_at,
            events: self.events,
            headers: self.headers,
        }
    }
}

/// A durably written commit as read back from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub commit_id: CommitId,
    pub stream_id: AggregateId,
    pub aggregate_type: String,
    /// Stream version after this commit.
    pub commit_sequence: Version,
    /// Global append position across all streams.
    pub checkpoint: i64,
    pub committed_at: DateTime<Utc>,
    pub events: Vec<EventEnvelope>,
    #[serde(default)]
    pub headers: HashMap<String, serde_json::Value>,
}

impl Commit {
    /// Returns true if `other` denotes the same durable commit.
    pub fn same_identity(&self, other: &Commit) -> bool {
        self.commit_id == other.commit_id
            && self.stream_id == other.stream_id
            && self.commit_sequence == other.commit_sequence
    }
}
