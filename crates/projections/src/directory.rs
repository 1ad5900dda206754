//! Customer directory read model.
//!
//! Lists customers with their names and state, and the accounts each of
//! them holds.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bus::{Bus, BusError, HandleMessage};
use common::{AggregateId, AggregateState, Version};
use domain::{
    Account, AccountClosed, AccountCreated, AccountEvent, AccountLocked, AccountUnlocked,
    Aggregate, Customer, CustomerClosed, CustomerCreated, CustomerEvent, CustomerUpdated,
};
use event_store::{Commit, EventEnvelope};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::projection::{Projection, ProjectionPosition, ReadModel};
use crate::{ProjectionError, Result};

/// A customer as listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerEntry {
    pub customer_id: AggregateId,
    pub first_name: String,
    pub last_name: String,
    pub state: AggregateState,
    pub version: Version,
    pub account_ids: Vec<AggregateId>,
}

/// An account as listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEntry {
    pub account_id: AggregateId,
    pub customer_id: AggregateId,
    pub currency: String,
    pub state: AggregateState,
    pub version: Version,
}

#[derive(Default)]
struct DirectoryState {
    customers: HashMap<AggregateId, CustomerEntry>,
    accounts: HashMap<AggregateId, AccountEntry>,
    position: ProjectionPosition,
}

impl DirectoryState {
    fn apply_customer(&mut self, event: CustomerEvent) {
        match event {
            CustomerEvent::CustomerCreated(e) => {
                self.customers
                    .entry(e.customer_id)
                    .or_insert_with(|| CustomerEntry {
                        customer_id: e.customer_id,
                        first_name: e.first_name,
                        last_name: e.last_name,
                        state: AggregateState::Open,
                        version: e.version,
                        account_ids: Vec::new(),
                    });
            }
            CustomerEvent::CustomerUpdated(e) => {
                if let Some(entry) = self.customers.get_mut(&e.customer_id)
                    && entry.version < e.version
                {
                    entry.first_name = e.first_name;
                    entry.last_name = e.last_name;
                    entry.version = e.version;
                }
            }
            CustomerEvent::CustomerClosed(e) => {
                if let Some(entry) = self.customers.get_mut(&e.customer_id)
                    && entry.version < e.version
                {
                    entry.state = AggregateState::Closed;
                    entry.version = e.version;
                }
            }
        }
    }

    fn apply_account(&mut self, event: AccountEvent) {
        let (account_id, version, state) = match event {
            AccountEvent::AccountCreated(e) => {
                if self.accounts.contains_key(&e.account_id) {
                    return;
                }
                if let Some(owner) = self.customers.get_mut(&e.customer_id) {
                    owner.account_ids.push(e.account_id);
                }
                self.accounts.insert(
                    e.account_id,
                    AccountEntry {
                        account_id: e.account_id,
                        customer_id: e.customer_id,
                        currency: e.currency.to_string(),
                        state: AggregateState::Open,
                        version: e.version,
                    },
                );
                return;
            }
            AccountEvent::AccountLocked(e) => (e.account_id, e.version, AggregateState::Locked),
            AccountEvent::AccountUnlocked(e) => {
                (e.account_id, e.version, AggregateState::Unlocked)
            }
            AccountEvent::AccountClosed(e) => (e.account_id, e.version, AggregateState::Closed),
        };

        if let Some(entry) = self.accounts.get_mut(&account_id)
            && entry.version < version
        {
            entry.state = state;
            entry.version = version;
        }
    }
}

/// Read model of customers and their accounts.
///
/// Fed live by raised events and by log replay alike. Every change is
/// guarded by the entry's version, so an event seen on both paths is
/// applied once.
#[derive(Clone, Default)]
pub struct CustomerDirectoryView {
    state: Arc<RwLock<DirectoryState>>,
}

impl CustomerDirectoryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn customer(&self, customer_id: AggregateId) -> Option<CustomerEntry> {
        self.state.read().await.customers.get(&customer_id).cloned()
    }

    pub async fn account(&self, account_id: AggregateId) -> Option<AccountEntry> {
        self.state.read().await.accounts.get(&account_id).cloned()
    }

    /// Accounts of a customer, in the order they were opened.
    pub async fn accounts_of(&self, customer_id: AggregateId) -> Vec<AccountEntry> {
        let state = self.state.read().await;
        state
            .customers
            .get(&customer_id)
            .map(|customer| {
                customer
                    .account_ids
                    .iter()
                    .filter_map(|id| state.accounts.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn customer_count(&self) -> usize {
        self.state.read().await.customers.len()
    }

    pub async fn account_count(&self) -> usize {
        self.state.read().await.accounts.len()
    }

    async fn apply_customer(&self, event: CustomerEvent) {
        self.state.write().await.apply_customer(event);
    }

    async fn apply_account(&self, event: AccountEvent) {
        self.state.write().await.apply_account(event);
    }
}

fn decode<E: DeserializeOwned>(event: &EventEnvelope) -> Result<E> {
    event.decode().map_err(|source| ProjectionError::Decode {
        stream_id: event.aggregate_id,
        event_type: event.event_type.clone(),
        source,
    })
}

#[async_trait]
impl ReadModel for CustomerDirectoryView {
    fn name(&self) -> &'static str {
        "CustomerDirectoryView"
    }

    async fn count(&self) -> usize {
        self.customer_count().await
    }
}

#[async_trait]
impl Projection for CustomerDirectoryView {
    fn name(&self) -> &'static str {
        "CustomerDirectoryView"
    }

    async fn apply(&self, commit: &Commit) -> Result<()> {
        let mut state = self.state.write().await;
        for event in &commit.events {
            if event.aggregate_type == Customer::aggregate_type() {
                state.apply_customer(decode(event)?);
            } else if event.aggregate_type == Account::aggregate_type() {
                state.apply_account(decode(event)?);
            } else {
                tracing::trace!(aggregate_type = %event.aggregate_type, "event ignored");
            }
        }
        state.position = state.position.advance_to(commit.checkpoint);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = DirectoryState::default();
        Ok(())
    }
}

macro_rules! live {
    ($event:ident => $wrap:ident :: $variant:ident, $apply:ident) => {
        #[async_trait]
        impl HandleMessage<$event> for CustomerDirectoryView {
            async fn handle(&self, event: &$event, _bus: &Bus) -> std::result::Result<(), BusError> {
                self.$apply($wrap::$variant(event.clone())).await;
                Ok(())
            }
        }
    };
}

live!(CustomerCreated => CustomerEvent::CustomerCreated, apply_customer);
live!(CustomerUpdated => CustomerEvent::CustomerUpdated, apply_customer);
live!(CustomerClosed => CustomerEvent::CustomerClosed, apply_customer);
live!(AccountCreated => AccountEvent::AccountCreated, apply_account);
live!(AccountLocked => AccountEvent::AccountLocked, apply_account);
live!(AccountUnlocked => AccountEvent::AccountUnlocked, apply_account);
live!(AccountClosed => AccountEvent::AccountClosed, apply_account);

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use domain::{Currency, DomainEvent, to_envelope};
    use event_store::CommitAttempt;

    use super::*;

    fn created(customer_id: AggregateId) -> CustomerEvent {
        CustomerEvent::CustomerCreated(CustomerCreated {
            customer_id,
            version: Version::first(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            created_at: Utc::now(),
        })
    }

    fn opened(account_id: AggregateId, customer_id: AggregateId) -> AccountEvent {
        AccountEvent::AccountCreated(AccountCreated {
            account_id,
            customer_id,
            version: Version::first(),
            currency: "EUR".parse::<Currency>().unwrap(),
            created_at: Utc::now(),
        })
    }

    fn committed(envelope: EventEnvelope, checkpoint: i64) -> Commit {
        CommitAttempt::new(
            envelope.aggregate_id,
            envelope.aggregate_type.clone(),
            Version::initial(),
            vec![envelope],
        )
        .into_commit(checkpoint, Utc::now())
    }

    #[tokio::test]
    async fn replay_builds_directory() {
        let view = CustomerDirectoryView::new();
        let customer_id = AggregateId::new();
        let account_id = AggregateId::new();

        let customer = to_envelope::<Customer>(customer_id, &created(customer_id)).unwrap();
        let account = to_envelope::<Account>(account_id, &opened(account_id, customer_id)).unwrap();
        view.apply(&committed(customer, 1)).await.unwrap();
        view.apply(&committed(account, 2)).await.unwrap();

        let entry = view.customer(customer_id).await.unwrap();
        assert_eq!(entry.first_name, "Ada");
        assert_eq!(entry.account_ids, vec![account_id]);

        let accounts = view.accounts_of(customer_id).await;
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].currency, "EUR");
        assert_eq!(view.position().await.checkpoint, 2);
        assert_eq!(ReadModel::count(&view).await, 1);
    }

    #[tokio::test]
    async fn same_event_on_both_paths_applies_once() {
        let view = CustomerDirectoryView::new();
        let customer_id = AggregateId::new();
        let account_id = AggregateId::new();
        view.apply_customer(created(customer_id)).await;

        let event = opened(account_id, customer_id);
        view.apply_account(event.clone()).await;
        let envelope = to_envelope::<Account>(account_id, &event).unwrap();
        view.apply(&committed(envelope, 1)).await.unwrap();

        assert_eq!(view.accounts_of(customer_id).await.len(), 1);
        assert_eq!(view.account_count().await, 1);
    }

    #[tokio::test]
    async fn stale_change_is_ignored() {
        let view = CustomerDirectoryView::new();
        let account_id = AggregateId::new();
        let customer_id = AggregateId::new();
        view.apply_account(opened(account_id, customer_id)).await;

        let locked = AccountEvent::AccountLocked(AccountLocked {
            account_id,
            version: Version::new(2),
            locked_at: Utc::now(),
        });
        let closed = AccountEvent::AccountClosed(AccountClosed {
            account_id,
            version: Version::new(3),
            closed_at: Utc::now(),
        });
        assert_eq!(locked.version(), Version::new(2));

        view.apply_account(closed).await;
        view.apply_account(locked).await;

        let entry = view.account(account_id).await.unwrap();
        assert_eq!(entry.state, AggregateState::Closed);
        assert_eq!(entry.version, Version::new(3));
    }

    #[tokio::test]
    async fn undecodable_event_names_its_stream() {
        let view = CustomerDirectoryView::new();
        let stream = AggregateId::new();
        let garbled = EventEnvelope::builder()
            .aggregate_id(stream)
            .aggregate_type("Customer")
            .event_type("CustomerCreated")
            .version(Version::first())
            .payload_raw(serde_json::json!({"unexpected": true}))
            .build()
            .unwrap();

        let error = view.apply(&committed(garbled, 1)).await.unwrap_err();

        assert!(matches!(
            error,
            ProjectionError::Decode { stream_id, ref event_type, .. }
                if stream_id == stream && event_type == "CustomerCreated"
        ));
        assert_eq!(view.position().await, ProjectionPosition::start());
    }

    #[tokio::test]
    async fn count_waits_for_a_writer() {
        let view = CustomerDirectoryView::new();
        let mut writer = view.state.write().await;

        let reader = tokio::spawn({
            let view = view.clone();
            async move { ReadModel::count(&view).await }
        });
        tokio::task::yield_now().await;
        writer.apply_customer(created(AggregateId::new()));
        drop(writer);

        assert_eq!(reader.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let view = CustomerDirectoryView::new();
        let customer_id = AggregateId::new();
        let envelope = to_envelope::<Customer>(customer_id, &created(customer_id)).unwrap();
        view.apply(&committed(envelope, 1)).await.unwrap();

        view.reset().await.unwrap();

        assert!(view.customer(customer_id).await.is_none());
        assert_eq!(view.position().await, ProjectionPosition::start());
    }
}
