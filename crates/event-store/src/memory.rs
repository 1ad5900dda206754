use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    AggregateId, Commit, CommitAttempt, EventStoreError, Result, Version,
    store::{CommitStream, EventStore},
};

#[derive(Default)]
struct Log {
    commits: Vec<Commit>,
    next_checkpoint: i64,
}

/// In-memory event log for tests and local runs.
///
/// Provides the same commit semantics as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of commits stored.
    pub async fn commit_count(&self) -> usize {
        self.log.read().await.commits.len()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log
            .read()
            .await
            .commits
            .iter()
            .map(|c| c.events.len())
            .sum()
    }

    /// Clears all commits.
    pub async fn clear(&self) {
        let mut log = self.log.write().await;
        log.commits.clear();
        log.next_checkpoint = 0;
    }

    fn head(log: &Log, stream_id: AggregateId) -> Version {
        log.commits
            .iter()
            .filter(|c| c.stream_id == stream_id)
            .map(|c| c.commit_sequence)
            .max()
            .unwrap_or(Version::initial())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn commit(&self, attempt: CommitAttempt) -> Result<Commit> {
        attempt.validate()?;

        let mut log = self.log.write().await;

        let current = Self::head(&log, attempt.stream_id);
        if current != attempt.expected_version {
            metrics::counter!("event_store_concurrency_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                stream_id: attempt.stream_id,
                expected: attempt.expected_version,
                actual: current,
            });
        }

        log.next_checkpoint += 1;
        let commit = attempt.into_commit(log.next_checkpoint, Utc::now());
        log.commits.push(commit.clone());

        metrics::counter!("event_store_commits_total").increment(1);
        tracing::debug!(
            stream_id = %commit.stream_id,
            commit_sequence = %commit.commit_sequence,
            checkpoint = commit.checkpoint,
            "commit appended"
        );

        Ok(commit)
    }

    async fn get_commits(
        &self,
        stream_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<Commit>> {
        let log = self.log.read().await;
        let mut commits: Vec<_> = log
            .commits
            .iter()
            .filter(|c| c.stream_id == stream_id && c.commit_sequence >= from_version)
            .cloned()
            .collect();
        commits.sort_by_key(|c| c.commit_sequence);
        Ok(commits)
    }

    async fn stream_all_commits(&self) -> Result<CommitStream> {
        use futures_util::stream;

        // Commits are pushed in checkpoint order.
        let commits = self.log.read().await.commits.clone();
        Ok(Box::pin(stream::iter(commits.into_iter().map(Ok))))
    }

    async fn get_stream_version(&self, stream_id: AggregateId) -> Result<Option<Version>> {
        let log = self.log.read().await;
        let head = Self::head(&log, stream_id);
        Ok((head != Version::initial()).then_some(head))
    }

    async fn retract(&self, commit: &Commit) -> Result<()> {
        let mut log = self.log.write().await;

        let index = log
            .commits
            .iter()
            .rposition(|c| c.commit_id == commit.commit_id)
            .filter(|_| Self::head(&log, commit.stream_id) == commit.commit_sequence)
            .ok_or(EventStoreError::NotStreamHead {
                stream_id: commit.stream_id,
                commit_sequence: commit.commit_sequence,
            })?;
        log.commits.remove(index);

        metrics::counter!("event_store_commits_retracted_total").increment(1);
        tracing::debug!(
            stream_id = %commit.stream_id,
            commit_sequence = %commit.commit_sequence,
            "commit retracted"
        );
        Ok(())
    }
}
