//! Loads aggregates from the event log and persists their changes to both
//! the log and the command-side store.

use std::sync::Arc;

use command_store::{CommandStackStore, CommandStackStoreExt};
use common::{AggregateId, Version};
use domain::{Aggregate, DomainEvent, replay, to_envelope};
use event_store::{Commit, CommitAttempt, EventStore, EventStoreExt};

use crate::{Result, SagaError, Snapshot};

/// Repository over type-erased stores, as resolved by the bus.
pub type SharedRepository = AggregateRepository<Arc<dyn EventStore>, Arc<dyn CommandStackStore>>;

/// Couples the event log with the command-side store.
///
/// A save appends one commit to the aggregate's stream first, then stores
/// the resulting snapshot. The commit passes the log's pre-commit hooks and
/// its optimistic check, so a rejected or stale command leaves both stores
/// untouched. When the snapshot cannot be stored the commit is retracted,
/// leaving the stream at its previous head.
pub struct AggregateRepository<S, D> {
    events: S,
    snapshots: D,
}

impl<S: EventStore, D: CommandStackStore> AggregateRepository<S, D> {
    pub fn new(events: S, snapshots: D) -> Self {
        Self { events, snapshots }
    }

    pub fn events(&self) -> &S {
        &self.events
    }

    pub fn snapshots(&self) -> &D {
        &self.snapshots
    }

    /// Rebuilds an aggregate from its stream.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn load<A: Aggregate>(&self, id: AggregateId) -> Result<A> {
        let envelopes = self.events.read(id).await?;
        replay::<A>(&envelopes)?.ok_or(SagaError::AggregateNotFound {
            aggregate_type: A::aggregate_type(),
            aggregate_id: id,
        })
    }

    /// Applies `events` to `aggregate` and persists them.
    ///
    /// `cause` names the message that produced the events and is recorded
    /// as a commit header. Returns the aggregate in its new state.
    #[tracing::instrument(skip_all, fields(aggregate_type = A::aggregate_type(), cause = cause))]
    pub async fn save<A: Snapshot>(
        &self,
        mut aggregate: A,
        events: Vec<A::Event>,
        cause: &'static str,
    ) -> Result<A> {
        let Some(first) = events.first() else {
            return Ok(aggregate);
        };
        let expected = Version::new(first.version().as_i64() - 1);

        aggregate.apply_events(events.iter().cloned());
        let snapshot = aggregate.snapshot()?;
        let id = snapshot.id();

        if let Some(customer_id) = aggregate.owner()
            && !self.snapshots.customer_exists(customer_id).await?
        {
            tracing::debug!(account_id = %id, %customer_id, "owner missing, nothing written");
            return Err(SagaError::OwnerNotFound {
                account_id: id,
                customer_id,
            });
        }

        let envelopes = events
            .iter()
            .map(|event| to_envelope::<A>(id, event))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let attempt = CommitAttempt::new(id, A::aggregate_type(), expected, envelopes)
            .with_header("cause", serde_json::json!(cause));

        let commit = self.events.commit(attempt).await?;
        if let Err(error) = self.snapshots.save(snapshot).await {
            self.retract(&commit).await;
            return Err(error.into());
        }

        metrics::counter!("saga_aggregate_saves_total", "aggregate_type" => A::aggregate_type())
            .increment(1);
        tracing::info!(
            aggregate_id = %id,
            version = %commit.commit_sequence,
            checkpoint = commit.checkpoint,
            "aggregate saved"
        );

        Ok(aggregate)
    }

    /// Takes back a commit whose snapshot could not be stored.
    async fn retract(&self, commit: &Commit) {
        match self.events.retract(commit).await {
            Ok(()) => {
                metrics::counter!("saga_commits_retracted_total").increment(1);
                tracing::warn!(
                    stream_id = %commit.stream_id,
                    commit_sequence = %commit.commit_sequence,
                    "snapshot save failed, commit retracted"
                );
            }
            Err(error) => tracing::error!(
                stream_id = %commit.stream_id,
                commit_sequence = %commit.commit_sequence,
                %error,
                "snapshot save failed and the commit could not be retracted"
            ),
        }
    }
}
