//! Customer domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, Event, Message, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on a customer aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CustomerEvent {
    /// Customer was registered.
    CustomerCreated(CustomerCreated),

    /// Customer names changed.
    CustomerUpdated(CustomerUpdated),

    /// Customer was closed.
    CustomerClosed(CustomerClosed),
}

impl DomainEvent for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::CustomerCreated(_) => CustomerCreated::MESSAGE_TYPE,
            CustomerEvent::CustomerUpdated(_) => CustomerUpdated::MESSAGE_TYPE,
            CustomerEvent::CustomerClosed(_) => CustomerClosed::MESSAGE_TYPE,
        }
    }

    fn version(&self) -> Version {
        match self {
            CustomerEvent::CustomerCreated(e) => e.version,
            CustomerEvent::CustomerUpdated(e) => e.version,
            CustomerEvent::CustomerClosed(e) => e.version,
        }
    }
}

/// A customer was registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerCreated {
    pub customer_id: AggregateId,
    pub version: Version,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl Message for CustomerCreated {
    const MESSAGE_TYPE: &'static str = "CustomerCreated";

    fn aggregate_id(&self) -> AggregateId {
        self.customer_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Event for CustomerCreated {}

/// A customer's names changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerUpdated {
    pub customer_id: AggregateId,
    pub version: Version,
    pub first_name: String,
    pub last_name: String,
    pub updated_at: DateTime<Utc>,
}

impl Message for CustomerUpdated {
    const MESSAGE_TYPE: &'static str = "CustomerUpdated";

    fn aggregate_id(&self) -> AggregateId {
        self.customer_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Event for CustomerUpdated {}

/// A customer was closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerClosed {
    pub customer_id: AggregateId,
    pub version: Version,
    pub closed_at: DateTime<Utc>,
}

impl Message for CustomerClosed {
    const MESSAGE_TYPE: &'static str = "CustomerClosed";

    fn aggregate_id(&self) -> AggregateId {
        self.customer_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Event for CustomerClosed {}
