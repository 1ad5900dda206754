//! Account aggregate and related types.

mod aggregate;
mod commands;
mod currency;
mod events;

pub use aggregate::Account;
pub use commands::{CloseAccount, CreateAccount, LockAccount, UnlockAccount};
pub use currency::Currency;
pub use events::{AccountClosed, AccountCreated, AccountEvent, AccountLocked, AccountUnlocked};

use common::AggregateState;
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    /// The currency code is not three ASCII letters.
    #[error("Invalid currency code: {code:?}")]
    InvalidCurrency { code: String },

    /// The account is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: AggregateState,
        action: &'static str,
    },

    /// The account was already created.
    #[error("Account already created")]
    AlreadyCreated,

    /// The account does not exist yet.
    #[error("Account not created")]
    NotCreated,
}
