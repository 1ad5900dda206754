//! Message delivery.

use std::any::{Any, TypeId};
use std::sync::Arc;

use common::{Command, Event, Message};

use crate::{
    BusConfig, BusError, CapabilityRegistry, Resolver, SagaKey, SagaStatus, SagaStore,
    registry::{HandlerRoute, SagaRoute},
};

/// A recipient failure that was isolated during a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientFailure {
    pub recipient: &'static str,
    pub error: BusError,
}

/// What happened to one delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub message_type: &'static str,
    /// Sagas started (or restarted) by the message.
    pub started: usize,
    /// Running sagas the message continued.
    pub continued: usize,
    /// Handlers that accepted the message.
    pub handled: usize,
    /// Continuations skipped because no running saga matched.
    pub dropped: usize,
    pub failures: Vec<RecipientFailure>,
}

impl DeliveryReport {
    fn new(message_type: &'static str) -> Self {
        Self {
            message_type,
            started: 0,
            continued: 0,
            handled: 0,
            dropped: 0,
            failures: Vec::new(),
        }
    }

    /// Number of recipients that ran to completion.
    pub fn delivered(&self) -> usize {
        self.started + self.continued + self.handled
    }

    /// True when no recipient failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct BusInner {
    registry: CapabilityRegistry,
    resolver: Arc<dyn Resolver>,
    sagas: SagaStore,
    config: BusConfig,
}

/// Routes commands and events to the sagas and handlers registered for
/// their concrete type.
///
/// For each message, sagas it starts run first, then running sagas it
/// continues, then handlers. Recipients run one after another in
/// registration order. Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    pub fn new(registry: CapabilityRegistry, resolver: Arc<dyn Resolver>, config: BusConfig) -> Self {
        tracing::info!(
            sagas = registry.saga_count(),
            handlers = registry.handler_count(),
            "bus ready"
        );
        Self {
            inner: Arc::new(BusInner {
                registry,
                resolver,
                sagas: SagaStore::new(),
                config,
            }),
        }
    }

    /// Delivers a command.
    pub async fn send<C: Command>(&self, command: C) -> Result<DeliveryReport, BusError> {
        self.deliver(&command).await
    }

    /// Delivers an event.
    pub async fn raise_event<E: Event>(&self, event: E) -> Result<DeliveryReport, BusError> {
        self.deliver(&event).await
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.inner.registry
    }

    pub fn sagas(&self) -> &SagaStore {
        &self.inner.sagas
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Lifecycle status of saga `S` for `correlation`.
    pub async fn saga_status<S: 'static>(&self, correlation: common::AggregateId) -> SagaStatus {
        self.inner.sagas.status(SagaKey::of::<S>(correlation)).await
    }

    /// Seeds the lifecycle of saga `S` for `correlation` when this bus has
    /// not tracked it yet. Returns whether anything was recorded.
    pub async fn restore_saga<S: 'static>(
        &self,
        correlation: common::AggregateId,
        status: SagaStatus,
    ) -> bool {
        self.inner
            .sagas
            .restore(SagaKey::of::<S>(correlation), status)
            .await
    }

    /// Forgets completed sagas older than the configured retention.
    pub async fn purge_completed_sagas(&self) -> usize {
        let purged = self
            .inner
            .sagas
            .purge(self.inner.config.saga_retention)
            .await;
        if purged > 0 {
            tracing::debug!(purged, "purged saga slots");
        }
        purged
    }

    async fn deliver<M: Message>(&self, message: &M) -> Result<DeliveryReport, BusError> {
        SagaStore::scoped(self.dispatch(message)).await
    }

    #[tracing::instrument(
        name = "deliver",
        skip(self, message),
        fields(
            message_type = M::MESSAGE_TYPE,
            aggregate_id = %message.aggregate_id(),
            version = %message.version(),
        )
    )]
    async fn dispatch<M: Message>(&self, message: &M) -> Result<DeliveryReport, BusError> {
        let message_type = TypeId::of::<M>();
        let correlation = message.correlation_id();
        let registry = &self.inner.registry;
        let mut report = DeliveryReport::new(M::MESSAGE_TYPE);

        for route in registry.sagas_started_by(message_type) {
            self.start(route, message, correlation, &mut report).await?;
        }
        for route in registry.sagas_continued_by(message_type) {
            self.continue_saga(route, message, correlation, &mut report)
                .await?;
        }
        for route in registry.handlers_of(message_type) {
            self.handle(route, message, &mut report).await?;
        }

        metrics::counter!("bus_messages_delivered_total", "message_type" => M::MESSAGE_TYPE)
            .increment(1);
        tracing::debug!(
            started = report.started,
            continued = report.continued,
            handled = report.handled,
            dropped = report.dropped,
            failures = report.failures.len(),
            "message delivered"
        );
        Ok(report)
    }

    async fn start(
        &self,
        route: &SagaRoute,
        message: &(dyn Any + Send + Sync),
        correlation: common::AggregateId,
        report: &mut DeliveryReport,
    ) -> Result<(), BusError> {
        let instance = match self
            .inner
            .resolver
            .resolve_instance(route.saga_type(), route.saga_name())
        {
            Ok(instance) => instance,
            Err(error) => return isolate(route.saga_name(), error, report),
        };

        let key = SagaKey::new(route.saga_type(), correlation);
        let guard = self.inner.sagas.enter_or_create(key).await;
        let previous = guard.status();

        match route.invoker.invoke(&*instance, message, self).await {
            Ok(status) => {
                guard.set_status(status);
                report.started += 1;
                tracing::debug!(saga = route.saga_name(), %correlation, ?status, "saga started");
                Ok(())
            }
            Err(error) => {
                guard.set_status(previous);
                isolate(route.saga_name(), error, report)
            }
        }
    }

    async fn continue_saga(
        &self,
        route: &SagaRoute,
        message: &(dyn Any + Send + Sync),
        correlation: common::AggregateId,
        report: &mut DeliveryReport,
    ) -> Result<(), BusError> {
        let key = SagaKey::new(route.saga_type(), correlation);
        let guard = match self.inner.sagas.enter_existing(key).await {
            Some(guard) if guard.status().is_running() => guard,
            _ => {
                report.dropped += 1;
                metrics::counter!("bus_continuations_dropped_total").increment(1);
                tracing::debug!(saga = route.saga_name(), %correlation, "no running saga, continuation dropped");
                return Ok(());
            }
        };

        let instance = match self
            .inner
            .resolver
            .resolve_instance(route.saga_type(), route.saga_name())
        {
            Ok(instance) => instance,
            Err(error) => return isolate(route.saga_name(), error, report),
        };

        match route.invoker.invoke(&*instance, message, self).await {
            Ok(status) => {
                guard.set_status(status);
                report.continued += 1;
                if status == SagaStatus::Completed {
                    tracing::debug!(saga = route.saga_name(), %correlation, "saga completed");
                }
                Ok(())
            }
            Err(error) => isolate(route.saga_name(), error, report),
        }
    }

    async fn handle(
        &self,
        route: &HandlerRoute,
        message: &(dyn Any + Send + Sync),
        report: &mut DeliveryReport,
    ) -> Result<(), BusError> {
        let instance = match self
            .inner
            .resolver
            .resolve_instance(route.handler_type(), route.handler_name())
        {
            Ok(instance) => instance,
            Err(error) => return isolate(route.handler_name(), error, report),
        };

        match route.invoker.invoke(&*instance, message, self).await {
            Ok(()) => {
                report.handled += 1;
                Ok(())
            }
            Err(error) => isolate(route.handler_name(), error, report),
        }
    }
}

/// Records an isolated failure, or hands back one that must abort delivery.
fn isolate(
    recipient: &'static str,
    error: BusError,
    report: &mut DeliveryReport,
) -> Result<(), BusError> {
    if !error.is_isolated() {
        tracing::debug!(recipient, %error, "delivery aborted");
        return Err(error);
    }

    metrics::counter!("bus_recipient_failures_total").increment(1);
    tracing::warn!(recipient, %error, "recipient failed");
    report.failures.push(RecipientFailure { recipient, error });
    Ok(())
}
