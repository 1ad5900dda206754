//! Commit pipeline hooks.
//!
//! Hooks gate what reaches the log and what is read back from it:
//!
//! - `pre_commit` runs before a write; any hook returning `false` aborts it
//!   and nothing becomes durable.
//! - `select` runs on every commit read back; returning `None` hides the
//!   commit from the reader.
//! - `post_commit` runs after a durable write; its failures are logged and
//!   never undo the write.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use thiserror::Error;

use crate::store::{CommitStream, EventStore};
use crate::{AggregateId, Commit, CommitAttempt, EventStoreError, Result, Version};

/// Error reported by a post-commit notification.
#[derive(Debug, Error)]
#[error("pipeline hook '{hook}' failed: {reason}")]
pub struct HookError {
    pub hook: &'static str,
    pub reason: String,
}

/// Extension point around the log's write and read paths.
#[async_trait]
pub trait PipelineHook: Send + Sync {
    /// Name used in logs and in `CommitRejected` errors.
    fn name(&self) -> &'static str;

    /// Decides whether an attempt may be written.
    async fn pre_commit(&self, _attempt: &CommitAttempt) -> bool {
        true
    }

    /// Filters a commit read back from the log.
    ///
    /// Must not change the commit's identity; a hook that does has the
    /// commit redacted instead.
    async fn select(&self, commit: Commit) -> Option<Commit> {
        Some(commit)
    }

    /// Notification after a successful durable write.
    async fn post_commit(&self, _commit: &Commit) -> std::result::Result<(), HookError> {
        Ok(())
    }
}

/// Authorization hook installed by default.
///
/// Allows and shows everything unless streams were denied, in which case
/// writes to them are rejected and their commits are redacted on read.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPipelineHook {
    denied_streams: HashSet<AggregateId>,
}

impl AuthorizationPipelineHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Denies access to a stream.
    pub fn deny_stream(mut self, stream_id: AggregateId) -> Self {
        self.denied_streams.insert(stream_id);
        self
    }

    fn is_authorized(&self, stream_id: AggregateId) -> bool {
        !self.denied_streams.contains(&stream_id)
    }
}

#[async_trait]
impl PipelineHook for AuthorizationPipelineHook {
    fn name(&self) -> &'static str {
        "authorization"
    }

    async fn pre_commit(&self, attempt: &CommitAttempt) -> bool {
        let allowed = self.is_authorized(attempt.stream_id);
        tracing::debug!(
            stream_id = %attempt.stream_id,
            commit_id = %attempt.commit_id,
            allowed,
            "authorizing commit"
        );
        allowed
    }

    async fn select(&self, commit: Commit) -> Option<Commit> {
        self.is_authorized(commit.stream_id).then_some(commit)
    }
}

/// Ordered set of hooks applied around every commit.
#[derive(Clone, Default)]
pub struct PipelineHooks {
    hooks: Vec<Arc<dyn PipelineHook>>,
}

impl PipelineHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook; hooks run in registration order.
    pub fn with(mut self, hook: impl PipelineHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Returns the name of the first hook that declines the attempt.
    pub async fn pre_commit(&self, attempt: &CommitAttempt) -> Option<&'static str> {
        for hook in &self.hooks {
            if !hook.pre_commit(attempt).await {
                return Some(hook.name());
            }
        }
        None
    }

    /// Passes a commit through every hook, stopping at the first redaction.
    pub async fn select(&self, commit: Commit) -> Option<Commit> {
        let mut current = commit;
        for hook in &self.hooks {
            let original = current.clone();
            match hook.select(current).await {
                Some(selected) if selected.same_identity(&original) => current = selected,
                Some(_) => {
                    tracing::error!(
                        hook = hook.name(),
                        commit_id = %original.commit_id,
                        "hook changed commit identity, redacting commit"
                    );
                    return None;
                }
                None => {
                    tracing::debug!(
                        hook = hook.name(),
                        commit_id = %original.commit_id,
                        "commit redacted"
                    );
                    return None;
                }
            }
        }
        Some(current)
    }

    /// Notifies every hook; failures are logged and otherwise ignored.
    pub async fn post_commit(&self, commit: &Commit) {
        for hook in &self.hooks {
            if let Err(e) = hook.post_commit(commit).await {
                metrics::counter!("event_store_post_commit_failures_total").increment(1);
                tracing::warn!(
                    hook = hook.name(),
                    commit_id = %commit.commit_id,
                    error = %e,
                    "post-commit hook failed"
                );
            }
        }
    }
}

/// An event store whose write and read paths run through pipeline hooks.
#[derive(Clone)]
pub struct HookedEventStore<S: EventStore> {
    inner: S,
    hooks: PipelineHooks,
}

impl<S: EventStore> HookedEventStore<S> {
    pub fn new(inner: S, hooks: PipelineHooks) -> Self {
        Self { inner, hooks }
    }

    /// Wraps a backend with the default authorization hook.
    pub fn with_default_hooks(inner: S) -> Self {
        Self::new(inner, PipelineHooks::new().with(AuthorizationPipelineHook::new()))
    }

    /// Gets a reference to the unhooked backend.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn hooks(&self) -> &PipelineHooks {
        &self.hooks
    }
}

#[async_trait]
impl<S: EventStore> EventStore for HookedEventStore<S> {
    #[tracing::instrument(skip(self, attempt), fields(stream_id = %attempt.stream_id, commit_id = %attempt.commit_id))]
    async fn commit(&self, attempt: CommitAttempt) -> Result<Commit> {
        if let Some(hook) = self.hooks.pre_commit(&attempt).await {
            metrics::counter!("event_store_commits_rejected_total").increment(1);
            tracing::info!(hook, "commit rejected by pipeline hook");
            return Err(EventStoreError::CommitRejected {
                stream_id: attempt.stream_id,
                hook,
            });
        }

        let commit = self.inner.commit(attempt).await?;
        self.hooks.post_commit(&commit).await;
        Ok(commit)
    }

    async fn get_commits(
        &self,
        stream_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<Commit>> {
        let commits = self.inner.get_commits(stream_id, from_version).await?;
        let mut visible = Vec::with_capacity(commits.len());
        for commit in commits {
            if let Some(commit) = self.hooks.select(commit).await {
                visible.push(commit);
            }
        }
        Ok(visible)
    }

    async fn stream_all_commits(&self) -> Result<CommitStream> {
        let hooks = self.hooks.clone();
        let stream = self.inner.stream_all_commits().await?.filter_map(move |result| {
            let hooks = hooks.clone();
            async move {
                match result {
                    Ok(commit) => hooks.select(commit).await.map(Ok),
                    Err(e) => Some(Err(e)),
                }
            }
        });
        Ok(Box::pin(stream))
    }

    /// Version of the last commit `select` lets through, so a redacted
    /// stream reads as absent.
    async fn get_stream_version(&self, stream_id: AggregateId) -> Result<Option<Version>> {
        if self.inner.get_stream_version(stream_id).await?.is_none() {
            return Ok(None);
        }
        let visible = self.get_commits(stream_id, Version::first()).await?;
        Ok(visible.last().map(|c| c.commit_sequence))
    }

    async fn retract(&self, commit: &Commit) -> Result<()> {
        self.inner.retract(commit).await?;
        tracing::info!(stream_id = %commit.stream_id, commit_id = %commit.commit_id, "commit retracted");
        Ok(())
    }
}
