//! Replays the commit log into projections.

use event_store::{Commit, EventStore};
use futures_util::TryStreamExt;

use crate::Result;
use crate::projection::Projection;

/// Drives registered projections from an event store.
///
/// Catch-up hands every commit to each projection whose position does not
/// cover its checkpoint yet, so repeated runs only apply what is new.
/// Wrap the store in a `HookedEventStore` to have replay honour the
/// pipeline's read-side selection.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams the log in checkpoint order and returns how many events it
    /// holds.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut commits = self.store.stream_all_commits().await?;
        let mut events: u64 = 0;
        let mut applied: u64 = 0;

        while let Some(commit) = commits.try_next().await? {
            events += commit.events.len() as u64;
            for projection in &self.projections {
                if !projection.position().await.covers(commit.checkpoint) {
                    projection.apply(&commit).await?;
                    applied += 1;
                }
            }
        }

        metrics::counter!("projections_commits_applied_total").increment(applied);
        tracing::info!(events, applied, "catch-up complete");
        Ok(events)
    }

    /// Hands one commit to every projection that has not applied it.
    #[tracing::instrument(skip(self, commit), fields(stream_id = %commit.stream_id, checkpoint = commit.checkpoint))]
    pub async fn process_commit(&self, commit: &Commit) -> Result<()> {
        for projection in &self.projections {
            if !projection.position().await.covers(commit.checkpoint) {
                projection.apply(commit).await?;
            }
        }
        Ok(())
    }

    /// Rewinds every projection and replays the whole log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            tracing::debug!(projection = projection.name(), "resetting");
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
