use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, AggregateState};
use tokio::sync::{Mutex, RwLock};

use crate::store::{bounded, check_continuity};
use crate::{
    AccountSnapshot, CommandStackStore, CommandStoreError, CustomerSnapshot, Result, StoreConfig,
};

type Slot<T> = Arc<Mutex<Option<T>>>;
type Table<T> = Arc<RwLock<HashMap<AggregateId, Slot<T>>>>;

/// In-memory gateway for tests and local runs.
///
/// Each row lives behind its own mutex; the table lock is only held long
/// enough to find or create a row slot.
#[derive(Clone, Default)]
pub struct InMemoryCommandStackStore {
    customers: Table<CustomerSnapshot>,
    accounts: Table<AccountSnapshot>,
    config: StoreConfig,
}

impl InMemoryCommandStackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the number of stored customers and accounts.
    pub async fn row_count(&self) -> usize {
        let mut count = 0;
        for slot in self.customers.read().await.values() {
            count += usize::from(slot.lock().await.is_some());
        }
        for slot in self.accounts.read().await.values() {
            count += usize::from(slot.lock().await.is_some());
        }
        count
    }

    async fn slot<T>(table: &Table<T>, id: AggregateId) -> Slot<T> {
        if let Some(slot) = table.read().await.get(&id) {
            return slot.clone();
        }
        table.write().await.entry(id).or_default().clone()
    }

    async fn existing<T: Clone>(table: &Table<T>, id: AggregateId) -> Option<T> {
        let slot = table.read().await.get(&id).cloned()?;
        let row = slot.lock().await;
        row.clone()
    }

    async fn write_customer(&self, snapshot: CustomerSnapshot) -> Result<CustomerSnapshot> {
        let slot = Self::slot(&self.customers, snapshot.id).await;
        let mut row = slot.lock().await;

        let stored = match &mut *row {
            Some(current) => {
                check_continuity(snapshot.id, current.version, snapshot.version)?;
                *current = snapshot;
                current.clone()
            }
            None => {
                let inserted = CustomerSnapshot {
                    state: AggregateState::Open,
                    ..snapshot
                };
                *row = Some(inserted.clone());
                inserted
            }
        };

        metrics::counter!("command_store_saves_total", "kind" => "Customer").increment(1);
        Ok(stored)
    }

    async fn write_account(&self, snapshot: AccountSnapshot) -> Result<AccountSnapshot> {
        // Customer rows are never removed, so the owner check holds once passed.
        if Self::existing(&self.customers, snapshot.customer_id)
            .await
            .is_none()
        {
            return Err(CommandStoreError::OwnerNotFound {
                account_id: snapshot.id,
                customer_id: snapshot.customer_id,
            });
        }

        let slot = Self::slot(&self.accounts, snapshot.id).await;
        let mut row = slot.lock().await;

        let stored = match &mut *row {
            Some(current) => {
                check_continuity(snapshot.id, current.version, snapshot.version)?;
                // Owner and currency are fixed at creation
                current.version = snapshot.version;
                current.state = snapshot.state;
                current.clone()
            }
            None => {
                let inserted = AccountSnapshot {
                    state: AggregateState::Open,
                    ..snapshot
                };
                *row = Some(inserted.clone());
                inserted
            }
        };

        metrics::counter!("command_store_saves_total", "kind" => "Account").increment(1);
        Ok(stored)
    }
}

#[async_trait]
impl CommandStackStore for InMemoryCommandStackStore {
    #[tracing::instrument(skip(self, snapshot), fields(customer_id = %snapshot.id, version = %snapshot.version))]
    async fn save_customer(&self, snapshot: CustomerSnapshot) -> Result<CustomerSnapshot> {
        bounded(
            self.config.operation_timeout,
            "save_customer",
            self.write_customer(snapshot),
        )
        .await
    }

    #[tracing::instrument(skip(self, snapshot), fields(account_id = %snapshot.id, version = %snapshot.version))]
    async fn save_account(&self, snapshot: AccountSnapshot) -> Result<AccountSnapshot> {
        bounded(
            self.config.operation_timeout,
            "save_account",
            self.write_account(snapshot),
        )
        .await
    }

    async fn get_customer(&self, id: AggregateId) -> Result<Option<CustomerSnapshot>> {
        Ok(Self::existing(&self.customers, id).await)
    }

    async fn get_account(&self, id: AggregateId) -> Result<Option<AccountSnapshot>> {
        Ok(Self::existing(&self.accounts, id).await)
    }
}
