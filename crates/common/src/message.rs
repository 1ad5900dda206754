//! Message contracts dispatched by the bus.
//!
//! Commands and domain events are distinct nominal types. The bus keys its
//! routing tables on the concrete type of a message, so two structs never
//! share a route even when one wraps the other.

use std::any::Any;
use std::fmt::Debug;

use crate::{AggregateId, Version};

/// A message targeting one aggregate.
///
/// # Example
///
/// ```
/// use common::{AggregateId, Command, Message, Version};
///
/// #[derive(Debug)]
/// struct Ping {
///     id: AggregateId,
/// }
///
/// impl Message for Ping {
///     const MESSAGE_TYPE: &'static str = "Ping";
///
///     fn aggregate_id(&self) -> AggregateId {
///         self.id
///     }
///
///     fn version(&self) -> Version {
///         Version::first()
///     }
/// }
///
/// impl Command for Ping {}
/// ```
pub trait Message: Any + Send + Sync + Debug {
    /// Stable name of the message type, used in logs and envelopes.
    const MESSAGE_TYPE: &'static str;

    /// The aggregate this message targets.
    fn aggregate_id(&self) -> AggregateId;

    /// The version the target aggregate has once this message is applied.
    fn version(&self) -> Version;

    /// Key used to find the saga instance this message belongs to.
    ///
    /// Defaults to the target aggregate.
    fn correlation_id(&self) -> AggregateId {
        self.aggregate_id()
    }
}

/// An intention to change an aggregate.
pub trait Command: Message {}

/// A fact that already happened to an aggregate.
pub trait Event: Message {}
