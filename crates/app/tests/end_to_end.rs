//! End-to-end flow through the wired application.
//!
//! The PostgreSQL case starts its own container. Run with:
//!
//! ```bash
//! cargo test -p app --test end_to_end -- --test-threads=1
//! ```

use std::sync::Arc;

use app::{Application, Config};
use bus::{BusError, SagaStatus};
use command_store::{CommandStackStore, InMemoryCommandStackStore};
use common::{AggregateId, AggregateState, Version};
use domain::{CloseCustomer, CreateAccount, CreateCustomer, LockAccount};
use event_store::{EventStore, EventStoreExt, HookedEventStore, InMemoryEventStore};
use projections::ReadModel;
use saga::{CreateBankAccountSaga, OpenAccountSaga};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

/// Opens a customer with one account and returns both ids.
async fn drive_opening_flow(app: &Application) -> (AggregateId, AggregateId) {
    let customer_id = AggregateId::new();
    let account_id = AggregateId::new();

    app.bus()
        .send(CreateCustomer::new(customer_id, "C1", "Holder"))
        .await
        .unwrap();
    let customer = app
        .repository()
        .snapshots()
        .get_customer(customer_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.version, Version::first());
    assert_eq!(customer.state, AggregateState::Open);

    app.bus()
        .send(CreateAccount::new(account_id, customer_id, "USD"))
        .await
        .unwrap();
    let account = app
        .repository()
        .snapshots()
        .get_account(account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.version, Version::first());
    assert_eq!(account.state, AggregateState::Open);
    assert_eq!(account.customer_id, customer_id);

    let duplicate = app
        .bus()
        .send(CreateAccount::new(account_id, customer_id, "USD"))
        .await;
    match duplicate {
        Err(BusError::ConcurrencyConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, Version::initial());
            assert_eq!(actual, Version::first());
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    // The rejected duplicate left both stores at version 1.
    let events = app.repository().events().read(account_id).await.unwrap();
    assert_eq!(events.len(), 1);
    let account = app
        .repository()
        .snapshots()
        .get_account(account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.version, Version::first());
    assert_eq!(
        app.bus().saga_status::<OpenAccountSaga>(account_id).await,
        SagaStatus::Running
    );

    let accounts = app.directory().accounts_of(customer_id).await;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].currency, "USD");
    (customer_id, account_id)
}

#[tokio::test]
async fn in_memory_end_to_end() {
    let app = Application::build(&Config::default()).await.unwrap();
    drive_opening_flow(&app).await;
    assert_eq!(app.directory().count().await, 1);
}

#[tokio::test]
async fn stale_lock_is_rejected_without_side_effects() {
    let app = Application::in_memory(&Config::default()).unwrap();
    let customer_id = AggregateId::new();
    let account_id = AggregateId::new();

    app.bus()
        .send(CreateCustomer::new(customer_id, "Edsger", "Dijkstra"))
        .await
        .unwrap();
    app.bus()
        .send(CreateAccount::new(account_id, customer_id, "EUR"))
        .await
        .unwrap();

    let stale = app
        .bus()
        .send(LockAccount::new(account_id, Version::new(3)))
        .await;
    assert!(matches!(stale, Err(BusError::ConcurrencyConflict { .. })));

    let entry = app.directory().account(account_id).await.unwrap();
    assert_eq!(entry.state, AggregateState::Open);
}

#[tokio::test]
async fn catch_up_on_empty_log_replays_nothing() {
    let app = Application::in_memory(&Config::default()).unwrap();
    assert_eq!(app.catch_up().await.unwrap(), 0);
    assert_eq!(app.directory().count().await, 0);
}

#[tokio::test]
async fn postgres_end_to_end() {
    let container = Postgres::default().start().await.unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

    let config = Config::default().with_database_url(url.clone());
    let app = Application::build(&config).await.unwrap();
    let (_, account_id) = drive_opening_flow(&app).await;

    // A second process on the same database rebuilds the directory and the
    // saga lifecycles from the log.
    let restarted = Application::build(&config).await.unwrap();
    assert_eq!(restarted.directory().count().await, 0);
    assert_eq!(restarted.catch_up().await.unwrap(), 2);
    assert_eq!(restarted.directory().count().await, 1);

    let report = restarted
        .bus()
        .send(LockAccount::new(account_id, Version::new(2)))
        .await
        .unwrap();
    assert_eq!(report.continued, 1);
    assert_eq!(
        restarted.directory().account(account_id).await.unwrap().state,
        AggregateState::Locked
    );
}

/// Two application instances over the same in-memory stores, the second
/// standing in for a restarted process.
fn shared_stores() -> (Arc<dyn EventStore>, Arc<dyn CommandStackStore>) {
    (
        Arc::new(HookedEventStore::with_default_hooks(InMemoryEventStore::new())),
        Arc::new(InMemoryCommandStackStore::new()),
    )
}

#[tokio::test]
async fn restarted_process_continues_running_sagas() {
    let config = Config::default();
    let (events, snapshots) = shared_stores();
    let first =
        Application::with_stores(Arc::clone(&events), Arc::clone(&snapshots), &config).unwrap();
    let (customer_id, account_id) = drive_opening_flow(&first).await;
    drop(first);

    let restarted = Application::with_stores(events, snapshots, &config).unwrap();
    let before = restarted
        .bus()
        .send(LockAccount::new(account_id, Version::new(2)))
        .await
        .unwrap();
    assert_eq!(before.continued, 0);
    assert_eq!(before.dropped, 1);

    assert_eq!(restarted.catch_up().await.unwrap(), 2);
    assert!(
        restarted
            .bus()
            .saga_status::<CreateBankAccountSaga>(customer_id)
            .await
            .is_running()
    );

    let after = restarted
        .bus()
        .send(LockAccount::new(account_id, Version::new(2)))
        .await
        .unwrap();
    assert_eq!(after.continued, 1);
    let account = restarted
        .repository()
        .snapshots()
        .get_account(account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.state, AggregateState::Locked);
    assert_eq!(account.version, Version::new(2));
}

#[tokio::test]
async fn closed_customer_is_not_revived_after_restart() {
    let config = Config::default();
    let (events, snapshots) = shared_stores();
    let first =
        Application::with_stores(Arc::clone(&events), Arc::clone(&snapshots), &config).unwrap();
    let customer_id = AggregateId::new();
    first
        .bus()
        .send(CreateCustomer::new(customer_id, "Barbara", "Liskov"))
        .await
        .unwrap();
    first
        .bus()
        .send(CloseCustomer::new(customer_id, Version::new(2)))
        .await
        .unwrap();
    drop(first);

    let restarted = Application::with_stores(events, snapshots, &config).unwrap();
    restarted.catch_up().await.unwrap();

    assert_eq!(
        restarted
            .bus()
            .saga_status::<CreateBankAccountSaga>(customer_id)
            .await,
        SagaStatus::Completed
    );
    let again = restarted
        .bus()
        .send(CloseCustomer::new(customer_id, Version::new(3)))
        .await
        .unwrap();
    assert_eq!(again.continued, 0);
}
