//! Customer aggregate implementation.

use chrono::Utc;
use common::{AggregateId, AggregateState, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    CloseCustomer, CreateCustomer, CustomerClosed, CustomerCreated, CustomerError, CustomerEvent,
    CustomerUpdated, UpdateCustomer, validate_names,
};

/// Customer aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    first_name: String,
    last_name: String,
    state: AggregateState,
}

impl Aggregate for Customer {
    type Event = CustomerEvent;
    type Error = CustomerError;

    fn aggregate_type() -> &'static str {
        "Customer"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CustomerEvent::CustomerCreated(data) => {
                self.id = Some(data.customer_id);
                self.first_name = data.first_name;
                self.last_name = data.last_name;
                self.state = AggregateState::Open;
            }
            CustomerEvent::CustomerUpdated(data) => {
                self.first_name = data.first_name;
                self.last_name = data.last_name;
            }
            CustomerEvent::CustomerClosed(_) => {
                self.state = AggregateState::Closed;
            }
        }
    }
}

// Query methods
impl Customer {
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn state(&self) -> AggregateState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }
}

// Command methods (return events)
impl Customer {
    /// Registers a new customer.
    pub fn create(&self, cmd: &CreateCustomer) -> Result<Vec<CustomerEvent>, CustomerError> {
        if self.id.is_some() {
            return Err(CustomerError::AlreadyCreated);
        }
        validate_names(&cmd.first_name, &cmd.last_name)?;

        Ok(vec![CustomerEvent::CustomerCreated(CustomerCreated {
            customer_id: cmd.customer_id,
            version: cmd.version,
            first_name: cmd.first_name.trim().to_string(),
            last_name: cmd.last_name.trim().to_string(),
            created_at: Utc::now(),
        })])
    }

    /// Changes the customer's names.
    pub fn update(&self, cmd: &UpdateCustomer) -> Result<Vec<CustomerEvent>, CustomerError> {
        self.ensure_active("update")?;
        validate_names(&cmd.first_name, &cmd.last_name)?;

        Ok(vec![CustomerEvent::CustomerUpdated(CustomerUpdated {
            customer_id: cmd.customer_id,
            version: cmd.version,
            first_name: cmd.first_name.trim().to_string(),
            last_name: cmd.last_name.trim().to_string(),
            updated_at: Utc::now(),
        })])
    }

    /// Closes the customer.
    pub fn close(&self, cmd: &CloseCustomer) -> Result<Vec<CustomerEvent>, CustomerError> {
        self.ensure_active("close")?;

        Ok(vec![CustomerEvent::CustomerClosed(CustomerClosed {
            customer_id: cmd.customer_id,
            version: cmd.version,
            closed_at: Utc::now(),
        })])
    }

    fn ensure_active(&self, action: &'static str) -> Result<(), CustomerError> {
        if self.id.is_none() {
            return Err(CustomerError::NotCreated);
        }
        if self.state.is_terminal() {
            return Err(CustomerError::InvalidStateTransition {
                current_state: self.state,
                action,
            });
        }
        Ok(())
    }
}
