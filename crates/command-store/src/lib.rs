//! Command-side persistence gateway.
//!
//! Stores the current state of customers and accounts as versioned rows.
//! Every save is a single check-and-write unit: an update must present the
//! version right after the stored one, and an account must reference a
//! stored customer.

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use config::StoreConfig;
pub use error::{CommandStoreError, Result};
pub use memory::InMemoryCommandStackStore;
pub use postgres::PostgresCommandStackStore;
pub use snapshot::{AccountSnapshot, AggregateSnapshot, CustomerSnapshot};
pub use store::{CommandStackStore, CommandStackStoreExt};
