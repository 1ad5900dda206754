//! Append-only event log with optimistic concurrency and a commit pipeline.
//!
//! Events are written to per-aggregate streams in atomic commits. Every
//! commit passes through [`PipelineHooks`] when the store is wrapped in a
//! [`HookedEventStore`].

pub mod commit;
pub mod error;
pub mod event;
pub mod hook;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::{AggregateId, Version};
pub use commit::{Commit, CommitAttempt, CommitId};
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId};
pub use hook::{AuthorizationPipelineHook, HookError, HookedEventStore, PipelineHook, PipelineHooks};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{CommitStream, EventStore, EventStoreExt};
