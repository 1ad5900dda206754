//! Customer commands.

use common::{AggregateId, Command, Message, Version};
use serde::{Deserialize, Serialize};

/// Command to register a new customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCustomer {
    pub customer_id: AggregateId,
    pub version: Version,
    pub first_name: String,
    pub last_name: String,
}

impl CreateCustomer {
    /// Creates a command for a new customer at version 1.
    pub fn new(
        customer_id: AggregateId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            customer_id,
            version: Version::first(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

impl Message for CreateCustomer {
    const MESSAGE_TYPE: &'static str = "CreateCustomer";

    fn aggregate_id(&self) -> AggregateId {
        self.customer_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Command for CreateCustomer {}

/// Command to change a customer's names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCustomer {
    pub customer_id: AggregateId,
    pub version: Version,
    pub first_name: String,
    pub last_name: String,
}

impl UpdateCustomer {
    pub fn new(
        customer_id: AggregateId,
        version: Version,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            customer_id,
            version,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

impl Message for UpdateCustomer {
    const MESSAGE_TYPE: &'static str = "UpdateCustomer";

    fn aggregate_id(&self) -> AggregateId {
        self.customer_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Command for UpdateCustomer {}

/// Command to close a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseCustomer {
    pub customer_id: AggregateId,
    pub version: Version,
}

impl CloseCustomer {
    pub fn new(customer_id: AggregateId, version: Version) -> Self {
        Self {
            customer_id,
            version,
        }
    }
}

impl Message for CloseCustomer {
    const MESSAGE_TYPE: &'static str = "CloseCustomer";

    fn aggregate_id(&self) -> AggregateId {
        self.customer_id
    }

    fn version(&self) -> Version {
        self.version
    }
}

impl Command for CloseCustomer {}
