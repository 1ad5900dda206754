//! Lifecycle state shared by every persisted aggregate.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The state of a customer or account.
///
/// The set is closed; the string form is what the command store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AggregateState {
    /// Newly created and usable.
    #[default]
    Open,

    /// Permanently closed (terminal state).
    Closed,

    /// Temporarily frozen.
    Locked,

    /// Released from a lock.
    Unlocked,
}

impl AggregateState {
    /// Returns true if no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AggregateState::Closed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateState::Open => "Open",
            AggregateState::Closed => "Closed",
            AggregateState::Locked => "Locked",
            AggregateState::Unlocked => "Unlocked",
        }
    }
}

impl std::fmt::Display for AggregateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a stored state string is not one of the four known states.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown aggregate state: {0}")]
pub struct ParseStateError(pub String);

impl FromStr for AggregateState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(AggregateState::Open),
            "Closed" => Ok(AggregateState::Closed),
            "Locked" => Ok(AggregateState::Locked),
            "Unlocked" => Ok(AggregateState::Unlocked),
            other => Err(ParseStateError(other.to_string())),
        }
    }
}
