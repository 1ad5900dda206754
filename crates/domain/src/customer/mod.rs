//! Customer aggregate and related types.

mod aggregate;
mod commands;
mod events;

pub use aggregate::Customer;
pub use commands::{CloseCustomer, CreateCustomer, UpdateCustomer};
pub use events::{CustomerClosed, CustomerCreated, CustomerEvent, CustomerUpdated};

use common::AggregateState;
use thiserror::Error;

/// Errors that can occur during customer operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustomerError {
    /// A required name is blank.
    #[error("Customer {field} must not be empty")]
    EmptyName { field: &'static str },

    /// The customer is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: AggregateState,
        action: &'static str,
    },

    /// The customer was already created.
    #[error("Customer already created")]
    AlreadyCreated,

    /// The customer does not exist yet.
    #[error("Customer not created")]
    NotCreated,
}

pub(crate) fn validate_names(first_name: &str, last_name: &str) -> Result<(), CustomerError> {
    if first_name.trim().is_empty() {
        return Err(CustomerError::EmptyName {
            field: "first name",
        });
    }
    if last_name.trim().is_empty() {
        return Err(CustomerError::EmptyName { field: "last name" });
    }
    Ok(())
}
