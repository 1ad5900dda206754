//! Composition root for the bank account core.
//!
//! Builds the capability registry, the instance container and the bus on top
//! of either in-memory or PostgreSQL stores, and keeps the customer directory
//! in step with both the live bus and the commit log.

pub mod config;
pub mod error;

use std::sync::Arc;

use bus::{Bus, CapabilityRegistry, Container, HandlerDescriptor, SagaDescriptor};
use command_store::{
    CommandStackStore, InMemoryCommandStackStore, PostgresCommandStackStore,
};
use domain::{
    AccountClosed, AccountCreated, AccountLocked, AccountUnlocked, CloseAccount, CloseCustomer,
    CreateAccount, CreateCustomer, CustomerClosed, CustomerCreated, CustomerUpdated, LockAccount,
    UnlockAccount, UpdateCustomer,
};
use event_store::{EventStore, HookedEventStore, InMemoryEventStore, PostgresEventStore};
use projections::{CustomerDirectoryView, ProjectionProcessor, ReadModel};
use saga::{
    AggregateRepository, CreateBankAccountSaga, OpenAccountSaga, SharedRepository, recover_sagas,
};
use sqlx::postgres::PgPoolOptions;

pub use config::Config;
pub use error::AppError;

/// Registers both sagas and the directory view with their capabilities.
pub fn registry() -> Result<CapabilityRegistry, bus::BusError> {
    let mut registry = CapabilityRegistry::new();
    registry
        .register_saga(
            SagaDescriptor::<CreateBankAccountSaga>::new()
                .started_by::<CreateCustomer>()
                .continued_by::<UpdateCustomer>()
                .continued_by::<CloseCustomer>(),
        )?
        .register_saga(
            SagaDescriptor::<OpenAccountSaga>::new()
                .started_by::<CreateAccount>()
                .continued_by::<LockAccount>()
                .continued_by::<UnlockAccount>()
                .continued_by::<CloseAccount>(),
        )?
        .register_handler(
            HandlerDescriptor::<CustomerDirectoryView>::new()
                .handles::<CustomerCreated>()
                .handles::<CustomerUpdated>()
                .handles::<CustomerClosed>()
                .handles::<AccountCreated>()
                .handles::<AccountLocked>()
                .handles::<AccountUnlocked>()
                .handles::<AccountClosed>(),
        )?;
    Ok(registry)
}

/// A wired bus with its read side.
pub struct Application {
    bus: Bus,
    directory: CustomerDirectoryView,
    processor: ProjectionProcessor<Arc<dyn EventStore>>,
    repository: Arc<SharedRepository>,
}

impl Application {
    /// Connects the backend named by `config` and wires the application.
    pub async fn build(config: &Config) -> Result<Self, AppError> {
        let Some(url) = config.database_url.as_deref() else {
            return Self::in_memory(config);
        };

        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        let events = PostgresEventStore::new(pool.clone());
        // One migration set creates both the commit log and the snapshot tables.
        events.run_migrations().await?;
        let snapshots = PostgresCommandStackStore::with_config(pool, config.store.clone());

        tracing::info!(backend = "postgres", "stores ready");
        Self::with_stores(
            Arc::new(HookedEventStore::with_default_hooks(events)),
            Arc::new(snapshots),
            config,
        )
    }

    /// Wires the application over fresh in-memory stores.
    pub fn in_memory(config: &Config) -> Result<Self, AppError> {
        tracing::info!(backend = "memory", "stores ready");
        Self::with_stores(
            Arc::new(HookedEventStore::with_default_hooks(InMemoryEventStore::new())),
            Arc::new(InMemoryCommandStackStore::with_config(config.store.clone())),
            config,
        )
    }

    /// Wires the application over stores the caller already holds, such as
    /// stores shared with a previous instance.
    pub fn with_stores(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn CommandStackStore>,
        config: &Config,
    ) -> Result<Self, AppError> {
        let repository = Arc::new(AggregateRepository::new(Arc::clone(&events), snapshots));
        let directory = CustomerDirectoryView::new();

        let mut processor = ProjectionProcessor::new(events);
        processor.register(Box::new(directory.clone()));

        let container = Container::new()
            .singleton(CreateBankAccountSaga::new(Arc::clone(&repository)))
            .singleton(OpenAccountSaga::new(Arc::clone(&repository)))
            .singleton(directory.clone());

        let registry = registry()?;
        tracing::info!(
            sagas = ?registry.saga_names().collect::<Vec<_>>(),
            handlers = ?registry.handler_names().collect::<Vec<_>>(),
            "capabilities registered"
        );

        Ok(Self {
            bus: Bus::new(registry, Arc::new(container), config.bus.clone()),
            directory,
            processor,
            repository,
        })
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn directory(&self) -> &CustomerDirectoryView {
        &self.directory
    }

    pub fn repository(&self) -> &SharedRepository {
        &self.repository
    }

    /// Replays the commit log before live traffic: the directory is brought
    /// up to date and every saga found in the log gets its lifecycle back.
    pub async fn catch_up(&self) -> Result<u64, AppError> {
        let replayed = self.processor.run_catch_up().await?;
        let sagas = recover_sagas(self.repository.events(), &self.bus).await?;
        tracing::info!(
            replayed,
            sagas,
            customers = self.directory.count().await,
            "caught up with the log"
        );
        Ok(replayed)
    }
}
