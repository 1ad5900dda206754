//! Rebuilds saga lifecycles from the event log after a restart.

use std::collections::HashMap;

use bus::{Bus, SagaStatus};
use common::{AggregateId, Message};
use domain::{
    Account, AccountClosed, AccountCreated, Aggregate, Customer, CustomerClosed, CustomerCreated,
};
use event_store::EventStore;
use futures_util::TryStreamExt;
use tracing::info;

use crate::{CreateBankAccountSaga, OpenAccountSaga, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Owner {
    Customer,
    Account,
}

#[derive(Debug, Default)]
struct Trace {
    created: bool,
    closed: bool,
}

impl Trace {
    /// A stream that was created and never closed is still running.
    fn status(&self) -> SagaStatus {
        if self.created && !self.closed {
            SagaStatus::Running
        } else {
            SagaStatus::Completed
        }
    }
}

fn owner_of(aggregate_type: &str) -> Option<Owner> {
    if aggregate_type == Customer::aggregate_type() {
        Some(Owner::Customer)
    } else if aggregate_type == Account::aggregate_type() {
        Some(Owner::Account)
    } else {
        None
    }
}

/// Seeds `bus` with the lifecycle of every saga correlation found in `events`.
///
/// Customer streams restore [`CreateBankAccountSaga`] and account streams
/// restore [`OpenAccountSaga`]. Correlations the bus already tracks are left
/// alone. Returns how many lifecycles were recorded.
pub async fn recover_sagas<S>(events: &S, bus: &Bus) -> Result<usize>
where
    S: EventStore + ?Sized,
{
    let mut traces: HashMap<(Owner, AggregateId), Trace> = HashMap::new();
    let mut commits = events.stream_all_commits().await?;

    while let Some(commit) = commits.try_next().await? {
        let Some(owner) = owner_of(&commit.aggregate_type) else {
            continue;
        };
        let trace = traces.entry((owner, commit.stream_id)).or_default();
        for event in &commit.events {
            let kind = event.event_type.as_str();
            if kind == CustomerCreated::MESSAGE_TYPE || kind == AccountCreated::MESSAGE_TYPE {
                trace.created = true;
            } else if kind == CustomerClosed::MESSAGE_TYPE || kind == AccountClosed::MESSAGE_TYPE {
                trace.closed = true;
            }
        }
    }

    let mut restored = 0;
    let mut running = 0;
    for ((owner, correlation), trace) in &traces {
        let status = trace.status();
        let recorded = match owner {
            Owner::Customer => {
                bus.restore_saga::<CreateBankAccountSaga>(*correlation, status)
                    .await
            }
            Owner::Account => bus.restore_saga::<OpenAccountSaga>(*correlation, status).await,
        };
        if recorded {
            restored += 1;
            running += usize::from(status.is_running());
        }
    }

    metrics::counter!("saga_lifecycles_restored_total").increment(restored as u64);
    info!(restored, running, "restored saga lifecycles from the log");
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bus::{BusConfig, CapabilityRegistry, Container};
    use command_store::InMemoryCommandStackStore;
    use domain::{CloseCustomer, CreateCustomer};
    use event_store::{InMemoryEventStore, Version};

    use super::*;
    use crate::AggregateRepository;

    type Repository = AggregateRepository<InMemoryEventStore, InMemoryCommandStackStore>;

    fn bus() -> Bus {
        Bus::new(
            CapabilityRegistry::new(),
            Arc::new(Container::new()),
            BusConfig::default(),
        )
    }

    async fn open_customer(repo: &Repository) -> AggregateId {
        let id = AggregateId::new();
        let events = Customer::default()
            .create(&CreateCustomer::new(id, "Ada", "Lovelace"))
            .unwrap();
        repo.save(Customer::default(), events, "CreateCustomer")
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn open_streams_run_and_closed_streams_complete() {
        let repo = Repository::new(InMemoryEventStore::new(), InMemoryCommandStackStore::new());
        let open = open_customer(&repo).await;
        let closed = open_customer(&repo).await;
        let customer: Customer = repo.load(closed).await.unwrap();
        let events = customer
            .close(&CloseCustomer::new(closed, Version::new(2)))
            .unwrap();
        repo.save(customer, events, "CloseCustomer").await.unwrap();

        let bus = bus();
        assert_eq!(recover_sagas(repo.events(), &bus).await.unwrap(), 2);

        assert!(
            bus.saga_status::<CreateBankAccountSaga>(open)
                .await
                .is_running()
        );
        assert_eq!(
            bus.saga_status::<CreateBankAccountSaga>(closed).await,
            SagaStatus::Completed
        );
        assert_eq!(
            bus.saga_status::<OpenAccountSaga>(open).await,
            SagaStatus::NotStarted
        );
    }

    #[tokio::test]
    async fn tracked_correlations_are_kept() {
        let repo = Repository::new(InMemoryEventStore::new(), InMemoryCommandStackStore::new());
        open_customer(&repo).await;

        let bus = bus();
        assert_eq!(recover_sagas(repo.events(), &bus).await.unwrap(), 1);
        assert_eq!(recover_sagas(repo.events(), &bus).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_log_restores_nothing() {
        let restored = recover_sagas(&InMemoryEventStore::new(), &bus()).await.unwrap();
        assert_eq!(restored, 0);
    }
}
