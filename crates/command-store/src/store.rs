use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AggregateId, Version};

use crate::{AccountSnapshot, AggregateSnapshot, CommandStoreError, CustomerSnapshot, Result};

/// Versioned current-state storage for customers and accounts.
///
/// A save inserts when no row exists (keeping the snapshot's version and
/// forcing the state to `Open`), otherwise it overwrites the row only if the
/// stored version is exactly `snapshot.version - 1`. Check and write happen
/// as one atomic unit per row; rows with different ids never contend.
#[async_trait]
pub trait CommandStackStore: Send + Sync {
    /// Inserts or updates a customer row, returning what was stored.
    async fn save_customer(&self, snapshot: CustomerSnapshot) -> Result<CustomerSnapshot>;

    /// Inserts or updates an account row, returning what was stored.
    ///
    /// Fails with `OwnerNotFound` when the owning customer is not stored.
    async fn save_account(&self, snapshot: AccountSnapshot) -> Result<AccountSnapshot>;

    async fn get_customer(&self, id: AggregateId) -> Result<Option<CustomerSnapshot>>;

    async fn get_account(&self, id: AggregateId) -> Result<Option<AccountSnapshot>>;
}

#[async_trait]
impl<T: CommandStackStore + ?Sized> CommandStackStore for Arc<T> {
    async fn save_customer(&self, snapshot: CustomerSnapshot) -> Result<CustomerSnapshot> {
        (**self).save_customer(snapshot).await
    }

    async fn save_account(&self, snapshot: AccountSnapshot) -> Result<AccountSnapshot> {
        (**self).save_account(snapshot).await
    }

    async fn get_customer(&self, id: AggregateId) -> Result<Option<CustomerSnapshot>> {
        (**self).get_customer(id).await
    }

    async fn get_account(&self, id: AggregateId) -> Result<Option<AccountSnapshot>> {
        (**self).get_account(id).await
    }
}

/// Convenience operations on top of [`CommandStackStore`].
#[async_trait]
pub trait CommandStackStoreExt: CommandStackStore {
    /// Saves either kind of snapshot.
    async fn save(&self, snapshot: AggregateSnapshot) -> Result<AggregateSnapshot> {
        match snapshot {
            AggregateSnapshot::Customer(c) => Ok(self.save_customer(c).await?.into()),
            AggregateSnapshot::Account(a) => Ok(self.save_account(a).await?.into()),
        }
    }

    async fn customer_exists(&self, id: AggregateId) -> Result<bool> {
        Ok(self.get_customer(id).await?.is_some())
    }
}

impl<T: CommandStackStore + ?Sized> CommandStackStoreExt for T {}

/// Rejects an update unless `stored` is the version right before `incoming`.
pub(crate) fn check_continuity(
    aggregate_id: AggregateId,
    stored: Version,
    incoming: Version,
) -> Result<()> {
    let expected = incoming.previous();
    if stored != expected {
        metrics::counter!("command_store_conflicts_total").increment(1);
        tracing::debug!(%aggregate_id, %expected, actual = %stored, "stale snapshot rejected");
        return Err(CommandStoreError::ConcurrencyConflict {
            aggregate_id,
            expected,
            actual: stored,
        });
    }
    Ok(())
}

/// Runs a gateway operation under a time bound.
///
/// On expiry the operation future is dropped, which releases any row lock or
/// transaction it held.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    operation: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            metrics::counter!("command_store_timeouts_total").increment(1);
            tracing::warn!(operation, ?timeout, "persistence operation timed out");
            Err(CommandStoreError::Timeout {
                operation,
                after: timeout,
            })
        }
    }
}
