//! Domain layer for the bank account core.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - The Customer aggregate with its commands and events
//! - The Account aggregate with its commands and events
//! - Envelope conversion and replay helpers

pub mod account;
pub mod aggregate;
pub mod customer;
pub mod envelope;
pub mod error;

pub use account::{
    Account, AccountClosed, AccountCreated, AccountError, AccountEvent, AccountLocked,
    AccountUnlocked, CloseAccount, CreateAccount, Currency, LockAccount, UnlockAccount,
};
pub use aggregate::{Aggregate, DomainEvent};
pub use customer::{
    CloseCustomer, CreateCustomer, Customer, CustomerClosed, CustomerCreated, CustomerError,
    CustomerEvent, CustomerUpdated, UpdateCustomer,
};
pub use envelope::{replay, to_envelope};
pub use error::DomainError;
