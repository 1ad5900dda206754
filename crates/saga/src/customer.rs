//! Customer lifecycle saga.

use std::sync::Arc;

use async_trait::async_trait;
use bus::{Bus, BusError, ContinuedBy, SagaStatus, StartedBy};
use common::Message;
use domain::{CloseCustomer, CreateCustomer, Customer, CustomerEvent, UpdateCustomer};

use crate::{SagaError, SharedRepository};

/// Registers customers and carries them through updates until closed.
///
/// Started by [`CreateCustomer`]; continued by [`UpdateCustomer`] and
/// [`CloseCustomer`], the latter completing the saga. Each step persists the
/// resulting event and raises it on the bus.
pub struct CreateBankAccountSaga {
    repository: Arc<SharedRepository>,
}

impl CreateBankAccountSaga {
    pub fn new(repository: Arc<SharedRepository>) -> Self {
        Self { repository }
    }
}

async fn raise(bus: &Bus, events: Vec<CustomerEvent>) -> Result<(), BusError> {
    for event in events {
        match event {
            CustomerEvent::CustomerCreated(e) => bus.raise_event(e).await?,
            CustomerEvent::CustomerUpdated(e) => bus.raise_event(e).await?,
            CustomerEvent::CustomerClosed(e) => bus.raise_event(e).await?,
        };
    }
    Ok(())
}

#[async_trait]
impl StartedBy<CreateCustomer> for CreateBankAccountSaga {
    #[tracing::instrument(skip_all, fields(customer_id = %message.customer_id))]
    async fn start(&self, message: &CreateCustomer, bus: &Bus) -> Result<SagaStatus, BusError> {
        let customer = Customer::default();
        let events = customer.create(message).map_err(SagaError::from)?;

        self.repository
            .save(customer, events.clone(), CreateCustomer::MESSAGE_TYPE)
            .await?;
        raise(bus, events).await?;

        Ok(SagaStatus::Running)
    }
}

#[async_trait]
impl ContinuedBy<UpdateCustomer> for CreateBankAccountSaga {
    #[tracing::instrument(skip_all, fields(customer_id = %message.customer_id))]
    async fn handle(&self, message: &UpdateCustomer, bus: &Bus) -> Result<SagaStatus, BusError> {
        let customer: Customer = self.repository.load(message.customer_id).await?;
        let events = customer.update(message).map_err(SagaError::from)?;

        self.repository
            .save(customer, events.clone(), UpdateCustomer::MESSAGE_TYPE)
            .await?;
        raise(bus, events).await?;

        Ok(SagaStatus::Running)
    }
}

#[async_trait]
impl ContinuedBy<CloseCustomer> for CreateBankAccountSaga {
    #[tracing::instrument(skip_all, fields(customer_id = %message.customer_id))]
    async fn handle(&self, message: &CloseCustomer, bus: &Bus) -> Result<SagaStatus, BusError> {
        let customer: Customer = self.repository.load(message.customer_id).await?;
        let events = customer.close(message).map_err(SagaError::from)?;

        self.repository
            .save(customer, events.clone(), CloseCustomer::MESSAGE_TYPE)
            .await?;
        raise(bus, events).await?;

        Ok(SagaStatus::Completed)
    }
}
