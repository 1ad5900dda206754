//! Sagas driving the customer and account lifecycles.
//!
//! Each saga step loads (or creates) its aggregate, lets the aggregate decide
//! on events, persists them through an [`AggregateRepository`] and raises
//! them on the bus for read models and other sagas.

pub mod account;
pub mod customer;
pub mod error;
pub mod recovery;
pub mod repository;
pub mod snapshot;

pub use account::OpenAccountSaga;
pub use customer::CreateBankAccountSaga;
pub use error::{Result, SagaError};
pub use recovery::recover_sagas;
pub use repository::{AggregateRepository, SharedRepository};
pub use snapshot::Snapshot;
