use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, Commit, CommitAttempt, EventEnvelope, Result, Version};

/// A stream of commits in global append order.
pub type CommitStream = Pin<Box<dyn Stream<Item = Result<Commit>> + Send>>;

/// Core trait for append-only event log implementations.
///
/// A log stores commits per stream (one stream per aggregate) and guards each
/// stream with optimistic concurrency. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Durably writes a commit attempt.
    ///
    /// Fails with `ConcurrencyConflict` when the stream head is not
    /// `attempt.expected_version`. Either every event is written or none is.
    async fn commit(&self, attempt: CommitAttempt) -> Result<Commit>;

    /// Retrieves the commits of one stream whose sequence is at least `from_version`,
    /// in sequence order.
    async fn get_commits(&self, stream_id: AggregateId, from_version: Version)
    -> Result<Vec<Commit>>;

    /// Streams every commit in the log in checkpoint order.
    async fn stream_all_commits(&self) -> Result<CommitStream>;

    /// Gets the current version of a stream, or None if nothing was committed to it.
    async fn get_stream_version(&self, stream_id: AggregateId) -> Result<Option<Version>>;

    /// Removes `commit` from its stream, restoring the previous head.
    ///
    /// Only the head of a stream can be retracted; anything else fails with
    /// `NotStreamHead` and leaves the log unchanged. Used to undo a commit
    /// whose command failed further down the write path.
    async fn retract(&self, commit: &Commit) -> Result<()>;
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn commit(&self, attempt: CommitAttempt) -> Result<Commit> {
        (**self).commit(attempt).await
    }

    async fn get_commits(
        &self,
        stream_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<Commit>> {
        (**self).get_commits(stream_id, from_version).await
    }

    async fn stream_all_commits(&self) -> Result<CommitStream> {
        (**self).stream_all_commits().await
    }

    async fn get_stream_version(&self, stream_id: AggregateId) -> Result<Option<Version>> {
        (**self).get_stream_version(stream_id).await
    }

    async fn retract(&self, commit: &Commit) -> Result<()> {
        (**self).retract(commit).await
    }
}

/// Extension trait providing the `Append`/`Read` surface on top of commits.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends events to a stream as a single commit.
    async fn append(
        &self,
        stream_id: AggregateId,
        aggregate_type: &str,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Commit> {
        let attempt = CommitAttempt::new(stream_id, aggregate_type, expected_version, events);
        self.commit(attempt).await
    }

    /// Reads every visible event of a stream, oldest first.
    async fn read(&self, stream_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        let commits = self.get_commits(stream_id, Version::first()).await?;
        Ok(commits.into_iter().flat_map(|c| c.events).collect())
    }

    /// Checks if a stream has any commits.
    async fn stream_exists(&self, stream_id: AggregateId) -> Result<bool> {
        Ok(self.get_stream_version(stream_id).await?.is_some())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}
