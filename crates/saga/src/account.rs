//! Account lifecycle saga.

use std::sync::Arc;

use async_trait::async_trait;
use bus::{Bus, BusError, ContinuedBy, SagaStatus, StartedBy};
use common::Message;
use domain::{
    Account, AccountEvent, CloseAccount, CreateAccount, LockAccount, UnlockAccount,
};

use crate::{SagaError, SharedRepository};

/// Opens an account for an existing customer and tracks it until closed.
///
/// Started by [`CreateAccount`]; continued by [`LockAccount`],
/// [`UnlockAccount`] and [`CloseAccount`]. Closing completes the saga.
pub struct OpenAccountSaga {
    repository: Arc<SharedRepository>,
}

impl OpenAccountSaga {
    pub fn new(repository: Arc<SharedRepository>) -> Self {
        Self { repository }
    }

    async fn persist(
        &self,
        account: Account,
        events: Vec<AccountEvent>,
        cause: &'static str,
        bus: &Bus,
    ) -> Result<(), BusError> {
        self.repository.save(account, events.clone(), cause).await?;

        for event in events {
            match event {
                AccountEvent::AccountCreated(e) => bus.raise_event(e).await?,
                AccountEvent::AccountLocked(e) => bus.raise_event(e).await?,
                AccountEvent::AccountUnlocked(e) => bus.raise_event(e).await?,
                AccountEvent::AccountClosed(e) => bus.raise_event(e).await?,
            };
        }
        Ok(())
    }
}

#[async_trait]
impl StartedBy<CreateAccount> for OpenAccountSaga {
    #[tracing::instrument(skip_all, fields(account_id = %message.account_id, customer_id = %message.customer_id))]
    async fn start(&self, message: &CreateAccount, bus: &Bus) -> Result<SagaStatus, BusError> {
        let account = Account::default();
        let events = account.create(message).map_err(SagaError::from)?;
        self.persist(account, events, CreateAccount::MESSAGE_TYPE, bus)
            .await?;
        Ok(SagaStatus::Running)
    }
}

#[async_trait]
impl ContinuedBy<LockAccount> for OpenAccountSaga {
    #[tracing::instrument(skip_all, fields(account_id = %message.account_id))]
    async fn handle(&self, message: &LockAccount, bus: &Bus) -> Result<SagaStatus, BusError> {
        let account: Account = self.repository.load(message.account_id).await?;
        let events = account.lock(message).map_err(SagaError::from)?;
        self.persist(account, events, LockAccount::MESSAGE_TYPE, bus)
            .await?;
        Ok(SagaStatus::Running)
    }
}

#[async_trait]
impl ContinuedBy<UnlockAccount> for OpenAccountSaga {
    #[tracing::instrument(skip_all, fields(account_id = %message.account_id))]
    async fn handle(&self, message: &UnlockAccount, bus: &Bus) -> Result<SagaStatus, BusError> {
        let account: Account = self.repository.load(message.account_id).await?;
        let events = account.unlock(message).map_err(SagaError::from)?;
        self.persist(account, events, UnlockAccount::MESSAGE_TYPE, bus)
            .await?;
        Ok(SagaStatus::Running)
    }
}

#[async_trait]
impl ContinuedBy<CloseAccount> for OpenAccountSaga {
    #[tracing::instrument(skip_all, fields(account_id = %message.account_id))]
    async fn handle(&self, message: &CloseAccount, bus: &Bus) -> Result<SagaStatus, BusError> {
        let account: Account = self.repository.load(message.account_id).await?;
        let events = account.close(message).map_err(SagaError::from)?;
        self.persist(account, events, CloseAccount::MESSAGE_TYPE, bus)
            .await?;
        Ok(SagaStatus::Completed)
    }
}
