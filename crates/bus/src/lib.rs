//! In-process command/event router.
//!
//! Sagas and handlers declare, per concrete message type, whether the
//! message starts them, continues them or is simply handled by them. The
//! [`Bus`] looks those declarations up in a [`CapabilityRegistry`], obtains
//! instances from a [`Resolver`] and tracks each saga correlation in a
//! [`SagaStore`].

pub mod bus;
pub mod capability;
pub mod config;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod saga;

pub use bus::{Bus, DeliveryReport, RecipientFailure};
pub use capability::{ContinuedBy, HandleMessage, StartedBy};
pub use config::BusConfig;
pub use error::BusError;
pub use registry::{CapabilityRegistry, HandlerDescriptor, SagaDescriptor};
pub use resolver::{Container, Instance, Resolver, ResolverExt};
pub use saga::{SagaKey, SagaStatus, SagaStore};
