//! Capability registry.
//!
//! Maps each concrete message type to the sagas it starts, the sagas it
//! continues and the handlers that receive it. Registrations are checked
//! once, up front, so routing never has to second-guess a recipient.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use common::Message;

use crate::{Bus, BusError, ContinuedBy, HandleMessage, SagaStatus, StartedBy};

#[async_trait]
pub(crate) trait SagaInvoker: Send + Sync {
    async fn invoke(
        &self,
        instance: &(dyn Any + Send + Sync),
        message: &(dyn Any + Send + Sync),
        bus: &Bus,
    ) -> Result<SagaStatus, BusError>;
}

#[async_trait]
pub(crate) trait HandlerInvoker: Send + Sync {
    async fn invoke(
        &self,
        instance: &(dyn Any + Send + Sync),
        message: &(dyn Any + Send + Sync),
        bus: &Bus,
    ) -> Result<(), BusError>;
}

fn downcast<T: Any>(value: &(dyn Any + Send + Sync)) -> Result<&T, BusError> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| BusError::ResolutionFailed {
            type_name: type_name::<T>(),
            reason: "instance has an unexpected type".to_string(),
        })
}

struct StartInvoker<S, M>(PhantomData<fn() -> (S, M)>);

#[async_trait]
impl<S: StartedBy<M>, M: Message> SagaInvoker for StartInvoker<S, M> {
    async fn invoke(
        &self,
        instance: &(dyn Any + Send + Sync),
        message: &(dyn Any + Send + Sync),
        bus: &Bus,
    ) -> Result<SagaStatus, BusError> {
        downcast::<S>(instance)?
            .start(downcast::<M>(message)?, bus)
            .await
    }
}

struct ContinueInvoker<S, M>(PhantomData<fn() -> (S, M)>);

#[async_trait]
impl<S: ContinuedBy<M>, M: Message> SagaInvoker for ContinueInvoker<S, M> {
    async fn invoke(
        &self,
        instance: &(dyn Any + Send + Sync),
        message: &(dyn Any + Send + Sync),
        bus: &Bus,
    ) -> Result<SagaStatus, BusError> {
        downcast::<S>(instance)?
            .handle(downcast::<M>(message)?, bus)
            .await
    }
}

struct HandleInvoker<H, M>(PhantomData<fn() -> (H, M)>);

#[async_trait]
impl<H: HandleMessage<M>, M: Message> HandlerInvoker for HandleInvoker<H, M> {
    async fn invoke(
        &self,
        instance: &(dyn Any + Send + Sync),
        message: &(dyn Any + Send + Sync),
        bus: &Bus,
    ) -> Result<(), BusError> {
        downcast::<H>(instance)?
            .handle(downcast::<M>(message)?, bus)
            .await
    }
}

/// Declared message type of a descriptor entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Declared {
    type_id: TypeId,
    name: &'static str,
}

impl Declared {
    fn of<M: Message>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: M::MESSAGE_TYPE,
        }
    }
}

/// The messages a saga type `S` is started and continued by.
///
/// Each declaration requires the matching capability trait:
///
/// ```ignore
/// let descriptor = SagaDescriptor::<OpenAccountSaga>::new()
///     .started_by::<CreateAccount>()
///     .continued_by::<LockAccount>();
/// ```
pub struct SagaDescriptor<S> {
    starts: Vec<(Declared, Arc<dyn SagaInvoker>)>,
    continues: Vec<(Declared, Arc<dyn SagaInvoker>)>,
    _saga: PhantomData<fn() -> S>,
}

impl<S: Send + Sync + 'static> SagaDescriptor<S> {
    pub fn new() -> Self {
        Self {
            starts: Vec::new(),
            continues: Vec::new(),
            _saga: PhantomData,
        }
    }

    /// Declares that messages of type `M` start this saga.
    pub fn started_by<M: Message>(mut self) -> Self
    where
        S: StartedBy<M>,
    {
        self.starts.push((
            Declared::of::<M>(),
            Arc::new(StartInvoker::<S, M>(PhantomData)),
        ));
        self
    }

    /// Declares that messages of type `M` continue this saga.
    pub fn continued_by<M: Message>(mut self) -> Self
    where
        S: ContinuedBy<M>,
    {
        self.continues.push((
            Declared::of::<M>(),
            Arc::new(ContinueInvoker::<S, M>(PhantomData)),
        ));
        self
    }
}

impl<S: Send + Sync + 'static> Default for SagaDescriptor<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// The messages a handler type `H` receives.
pub struct HandlerDescriptor<H> {
    handles: Vec<(Declared, Arc<dyn HandlerInvoker>)>,
    _handler: PhantomData<fn() -> H>,
}

impl<H: Send + Sync + 'static> HandlerDescriptor<H> {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            _handler: PhantomData,
        }
    }

    /// Declares that `H` handles messages of type `M`.
    pub fn handles<M: Message>(mut self) -> Self
    where
        H: HandleMessage<M>,
    {
        self.handles.push((
            Declared::of::<M>(),
            Arc::new(HandleInvoker::<H, M>(PhantomData)),
        ));
        self
    }
}

impl<H: Send + Sync + 'static> Default for HandlerDescriptor<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// A saga reachable from some message type.
#[derive(Clone)]
pub struct SagaRoute {
    saga: TypeId,
    saga_name: &'static str,
    pub(crate) invoker: Arc<dyn SagaInvoker>,
}

impl SagaRoute {
    pub fn saga_type(&self) -> TypeId {
        self.saga
    }

    pub fn saga_name(&self) -> &'static str {
        self.saga_name
    }
}

/// A handler reachable from some message type.
#[derive(Clone)]
pub struct HandlerRoute {
    handler: TypeId,
    handler_name: &'static str,
    pub(crate) invoker: Arc<dyn HandlerInvoker>,
}

impl HandlerRoute {
    pub fn handler_type(&self) -> TypeId {
        self.handler
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }
}

/// Routing tables keyed by concrete message type.
///
/// Built once at startup and shared read-only by the bus afterwards.
#[derive(Default)]
pub struct CapabilityRegistry {
    starts: HashMap<TypeId, Vec<SagaRoute>>,
    continues: HashMap<TypeId, Vec<SagaRoute>>,
    handlers: HashMap<TypeId, Vec<HandlerRoute>>,
    sagas: Vec<(TypeId, &'static str)>,
    handler_types: Vec<(TypeId, &'static str)>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a saga type with its start and continue messages.
    ///
    /// Fails if the saga declares no start message, declares the same
    /// message twice, uses one message both to start and to continue, or was
    /// registered before.
    pub fn register_saga<S: Send + Sync + 'static>(
        &mut self,
        descriptor: SagaDescriptor<S>,
    ) -> Result<&mut Self, BusError> {
        let saga = TypeId::of::<S>();
        let saga_name = type_name::<S>();

        if self.sagas.iter().any(|(id, _)| *id == saga) {
            return Err(BusError::invalid_registration(saga_name, "saga already registered"));
        }
        if descriptor.starts.is_empty() {
            return Err(BusError::invalid_registration(
                saga_name,
                "a saga must be started by at least one message type",
            ));
        }

        let declared: Vec<Declared> = descriptor
            .starts
            .iter()
            .chain(descriptor.continues.iter())
            .map(|(declared, _)| *declared)
            .collect();
        for (i, message) in declared.iter().enumerate() {
            if declared[..i].contains(message) {
                let starts_too = descriptor
                    .starts
                    .iter()
                    .any(|(start, _)| start == message);
                let reason = if starts_too && i >= descriptor.starts.len() {
                    format!("{} both starts and continues the saga", message.name)
                } else {
                    format!("{} declared more than once", message.name)
                };
                return Err(BusError::invalid_registration(saga_name, reason));
            }
        }

        for (message, invoker) in descriptor.starts {
            self.starts.entry(message.type_id).or_default().push(SagaRoute {
                saga,
                saga_name,
                invoker,
            });
        }
        for (message, invoker) in descriptor.continues {
            self.continues
                .entry(message.type_id)
                .or_default()
                .push(SagaRoute {
                    saga,
                    saga_name,
                    invoker,
                });
        }
        self.sagas.push((saga, saga_name));

        tracing::debug!(saga = saga_name, "saga registered");
        Ok(self)
    }

    /// Registers a handler type with the messages it receives.
    pub fn register_handler<H: Send + Sync + 'static>(
        &mut self,
        descriptor: HandlerDescriptor<H>,
    ) -> Result<&mut Self, BusError> {
        let handler = TypeId::of::<H>();
        let handler_name = type_name::<H>();

        if self.handler_types.iter().any(|(id, _)| *id == handler) {
            return Err(BusError::invalid_registration(
                handler_name,
                "handler already registered",
            ));
        }

        for (message, invoker) in descriptor.handles {
            let routes = self.handlers.entry(message.type_id).or_default();
            if routes.iter().all(|route| route.handler != handler) {
                routes.push(HandlerRoute {
                    handler,
                    handler_name,
                    invoker,
                });
            }
        }
        self.handler_types.push((handler, handler_name));

        tracing::debug!(handler = handler_name, "handler registered");
        Ok(self)
    }

    /// Sagas started by messages of type `message`.
    pub fn sagas_started_by(&self, message: TypeId) -> &[SagaRoute] {
        self.starts.get(&message).map(Vec::as_slice).unwrap_or_default()
    }

    /// Sagas continued by messages of type `message`.
    pub fn sagas_continued_by(&self, message: TypeId) -> &[SagaRoute] {
        self.continues.get(&message).map(Vec::as_slice).unwrap_or_default()
    }

    /// Handlers receiving messages of type `message`.
    pub fn handlers_of(&self, message: TypeId) -> &[HandlerRoute] {
        self.handlers.get(&message).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn saga_count(&self) -> usize {
        self.sagas.len()
    }

    pub fn handler_count(&self) -> usize {
        self.handler_types.len()
    }

    pub fn saga_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sagas.iter().map(|(_, name)| *name)
    }

    pub fn handler_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handler_types.iter().map(|(_, name)| *name)
    }
}
