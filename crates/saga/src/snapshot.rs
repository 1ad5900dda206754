//! Projection of aggregates onto command-side rows.

use command_store::{AccountSnapshot, AggregateSnapshot, CustomerSnapshot};
use common::AggregateId;
use domain::{Account, Aggregate, Customer};

use crate::{Result, SagaError};

/// An aggregate whose current state can be stored as a snapshot.
pub trait Snapshot: Aggregate {
    /// The row describing the aggregate's current state.
    fn snapshot(&self) -> Result<AggregateSnapshot>;

    /// The aggregate that must already be stored before this one.
    fn owner(&self) -> Option<AggregateId> {
        None
    }
}

fn identity<A: Aggregate>(aggregate: &A) -> Result<AggregateId> {
    aggregate.id().ok_or(SagaError::Unidentified {
        aggregate_type: A::aggregate_type(),
    })
}

impl Snapshot for Customer {
    fn snapshot(&self) -> Result<AggregateSnapshot> {
        Ok(CustomerSnapshot {
            id: identity(self)?,
            version: self.version(),
            first_name: self.first_name().to_string(),
            last_name: self.last_name().to_string(),
            state: self.state(),
        }
        .into())
    }
}

impl Snapshot for Account {
    fn snapshot(&self) -> Result<AggregateSnapshot> {
        let id = identity(self)?;
        let customer_id = self.customer_id().ok_or(SagaError::Unidentified {
            aggregate_type: Account::aggregate_type(),
        })?;

        Ok(AccountSnapshot {
            id,
            version: self.version(),
            customer_id,
            currency: self
                .currency()
                .map(ToString::to_string)
                .unwrap_or_default(),
            state: self.state(),
        }
        .into())
    }

    fn owner(&self) -> Option<AggregateId> {
        self.customer_id()
    }
}

#[cfg(test)]
mod tests {
    use common::{AggregateState, Version};
    use domain::{CreateAccount, CreateCustomer};

    use super::*;

    #[test]
    fn customer_snapshot_carries_names_and_version() {
        let id = AggregateId::new();
        let mut customer = Customer::default();
        let events = customer
            .create(&CreateCustomer::new(id, "Ada", "Lovelace"))
            .unwrap();
        customer.apply_events(events);

        match customer.snapshot().unwrap() {
            AggregateSnapshot::Customer(row) => {
                assert_eq!(row.id, id);
                assert_eq!(row.version, Version::first());
                assert_eq!(row.first_name, "Ada");
                assert_eq!(row.state, AggregateState::Open);
            }
            other => panic!("expected a customer row, got {other:?}"),
        }
        assert_eq!(customer.owner(), None);
    }

    #[test]
    fn account_snapshot_names_its_owner() {
        let account_id = AggregateId::new();
        let customer_id = AggregateId::new();
        let mut account = Account::default();
        let events = account
            .create(&CreateAccount::new(account_id, customer_id, "eur"))
            .unwrap();
        account.apply_events(events);

        assert_eq!(account.owner(), Some(customer_id));
        match account.snapshot().unwrap() {
            AggregateSnapshot::Account(row) => {
                assert_eq!(row.customer_id, customer_id);
                assert_eq!(row.currency, "EUR");
            }
            other => panic!("expected an account row, got {other:?}"),
        }
    }

    #[test]
    fn unidentified_aggregate_has_no_snapshot() {
        assert!(matches!(
            Customer::default().snapshot(),
            Err(SagaError::Unidentified { .. })
        ));
    }
}
