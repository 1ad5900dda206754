//! Replay and query seams of a read model.

use async_trait::async_trait;
use event_store::Commit;

use crate::Result;

/// Log checkpoint up to which a projection has applied commits.
///
/// Checkpoints are assigned by the log starting at 1, so the start position
/// covers nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    pub checkpoint: i64,
}

impl ProjectionPosition {
    pub fn start() -> Self {
        Self::default()
    }

    /// Position after applying the commit at `checkpoint`. Never moves back.
    pub fn advance_to(self, checkpoint: i64) -> Self {
        Self {
            checkpoint: self.checkpoint.max(checkpoint),
        }
    }

    /// Whether the commit at `checkpoint` has already been applied.
    pub fn covers(&self, checkpoint: i64) -> bool {
        checkpoint <= self.checkpoint
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "checkpoint {}", self.checkpoint)
    }
}

/// A read model that can be rebuilt from the commit log.
///
/// Only replayed commits move the position; events delivered live through
/// the bus leave it where it is.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Applies every event of `commit` and advances past its checkpoint.
    async fn apply(&self, commit: &Commit) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all state and rewinds to the start of the log.
    async fn reset(&self) -> Result<()>;
}

/// Query access to a read model.
#[async_trait]
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of top-level entries, waiting for any writer in progress.
    async fn count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_covers_nothing() {
        assert!(!ProjectionPosition::start().covers(1));
    }

    #[test]
    fn advance_never_moves_back() {
        let position = ProjectionPosition::start().advance_to(5).advance_to(3);
        assert_eq!(position.checkpoint, 5);
        assert!(position.covers(3));
        assert!(position.covers(5));
        assert!(!position.covers(6));
        assert_eq!(position.to_string(), "checkpoint 5");
    }
}
