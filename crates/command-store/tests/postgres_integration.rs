//! PostgreSQL integration tests for the persistence gateway.
//!
//! Run with:
//!
//! ```bash
//! cargo test -p command-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use command_store::{
    AccountSnapshot, CommandStackStore, CommandStoreError, CustomerSnapshot,
    PostgresCommandStackStore, StoreConfig,
};
use common::{AggregateId, AggregateState, Version};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresCommandStackStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresCommandStackStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE accounts, customers")
        .execute(&pool)
        .await
        .unwrap();

    PostgresCommandStackStore::with_config(
        pool,
        StoreConfig::default().with_operation_timeout(Duration::from_secs(10)),
    )
}

fn customer(id: AggregateId, version: i64) -> CustomerSnapshot {
    CustomerSnapshot {
        id,
        version: Version::new(version),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        state: AggregateState::Open,
    }
}

fn account(id: AggregateId, customer_id: AggregateId, version: i64) -> AccountSnapshot {
    AccountSnapshot {
        id,
        version: Version::new(version),
        customer_id,
        currency: "EUR".to_string(),
        state: AggregateState::Open,
    }
}

#[tokio::test]
async fn insert_and_read_customer() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    let saved = store
        .save_customer(CustomerSnapshot {
            state: AggregateState::Closed,
            ..customer(id, 1)
        })
        .await
        .unwrap();
    assert_eq!(saved.state, AggregateState::Open);

    let stored = store.get_customer(id).await.unwrap().unwrap();
    assert_eq!(stored, saved);
}

#[tokio::test]
async fn consecutive_updates_then_stale_update() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    for v in 1..=3 {
        store.save_customer(customer(id, v)).await.unwrap();
    }

    let result = store
        .save_customer(CustomerSnapshot {
            first_name: "Grace".to_string(),
            ..customer(id, 3)
        })
        .await;

    assert!(matches!(
        result,
        Err(CommandStoreError::ConcurrencyConflict { actual, .. }) if actual == Version::new(3)
    ));
    let stored = store.get_customer(id).await.unwrap().unwrap();
    assert_eq!(stored.first_name, "Ada");
    assert_eq!(stored.version, Version::new(3));
}

#[tokio::test]
async fn account_requires_owner() {
    let store = get_test_store().await;
    let account_id = AggregateId::new();

    let result = store
        .save_account(account(account_id, AggregateId::new(), 1))
        .await;

    assert!(matches!(result, Err(CommandStoreError::OwnerNotFound { .. })));
    assert!(store.get_account(account_id).await.unwrap().is_none());
}

#[tokio::test]
async fn account_lifecycle() {
    let store = get_test_store().await;
    let customer_id = AggregateId::new();
    let account_id = AggregateId::new();

    store.save_customer(customer(customer_id, 1)).await.unwrap();
    store
        .save_account(account(account_id, customer_id, 1))
        .await
        .unwrap();
    let locked = store
        .save_account(AccountSnapshot {
            state: AggregateState::Locked,
            ..account(account_id, customer_id, 2)
        })
        .await
        .unwrap();

    assert_eq!(locked.state, AggregateState::Locked);
    assert_eq!(locked.currency, "EUR");
    assert_eq!(locked.version, Version::new(2));

    let duplicate = store
        .save_account(account(account_id, customer_id, 1))
        .await;
    assert!(matches!(
        duplicate,
        Err(CommandStoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
async fn racing_updates_only_one_wins() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    store.save_customer(customer(id, 1)).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .save_customer(CustomerSnapshot {
                    first_name: format!("Writer{i}"),
                    ..customer(id, 2)
                })
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(CommandStoreError::ConcurrencyConflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(
        store.get_customer(id).await.unwrap().unwrap().version,
        Version::new(2)
    );
}

#[tokio::test]
async fn racing_inserts_only_one_wins() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.save_customer(customer(id, 1)).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(CommandStoreError::ConcurrencyConflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
}
