//! Instance resolution for sagas and handlers.
//!
//! The bus never constructs recipients itself. It asks a [`Resolver`] for an
//! instance of the registered type each time a message is routed to it.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use crate::BusError;

/// A type-erased recipient instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Produces recipient instances by type.
pub trait Resolver: Send + Sync {
    /// Returns an instance of the type identified by `type_id`.
    ///
    /// `type_name` is only used for error reporting.
    fn resolve_instance(&self, type_id: TypeId, type_name: &'static str)
    -> Result<Instance, BusError>;
}

/// Typed convenience over [`Resolver`].
pub trait ResolverExt: Resolver {
    /// Resolves and downcasts an instance of `T`.
    fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, BusError> {
        let name = type_name::<T>();
        self.resolve_instance(TypeId::of::<T>(), name)?
            .downcast::<T>()
            .map_err(|_| BusError::ResolutionFailed {
                type_name: name,
                reason: "resolver returned an instance of another type".to_string(),
            })
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

type Factory = Box<dyn Fn() -> Result<Instance, String> + Send + Sync>;

enum Registration {
    Singleton(Instance),
    Transient(Factory),
}

/// A small type-keyed container.
///
/// Singletons hand out the same instance on every resolution; transients
/// build a new one each time.
#[derive(Default)]
pub struct Container {
    registrations: HashMap<TypeId, Registration>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shared instance of `T`, replacing any earlier registration.
    pub fn singleton<T: Any + Send + Sync>(self, instance: T) -> Self {
        self.singleton_arc(Arc::new(instance))
    }

    /// Registers an already shared instance of `T`.
    pub fn singleton_arc<T: Any + Send + Sync>(mut self, instance: Arc<T>) -> Self {
        self.registrations
            .insert(TypeId::of::<T>(), Registration::Singleton(instance));
        self
    }

    /// Registers a factory that builds a fresh `T` per resolution.
    pub fn transient<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.registrations.insert(
            TypeId::of::<T>(),
            Registration::Transient(Box::new(move || Ok(Arc::new(factory()) as Instance))),
        );
        self
    }

    /// Registers a fallible factory; its error becomes `ResolutionFailed`.
    pub fn try_transient<T, E, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        E: Display,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.registrations.insert(
            TypeId::of::<T>(),
            Registration::Transient(Box::new(move || {
                factory()
                    .map(|instance| Arc::new(instance) as Instance)
                    .map_err(|e| e.to_string())
            })),
        );
        self
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl Resolver for Container {
    fn resolve_instance(
        &self,
        type_id: TypeId,
        type_name: &'static str,
    ) -> Result<Instance, BusError> {
        match self.registrations.get(&type_id) {
            Some(Registration::Singleton(instance)) => Ok(Arc::clone(instance)),
            Some(Registration::Transient(factory)) => {
                factory().map_err(|reason| BusError::ResolutionFailed { type_name, reason })
            }
            None => Err(BusError::ResolutionFailed {
                type_name,
                reason: "no registration".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug)]
    struct Clock(u32);

    #[test]
    fn singleton_is_shared() {
        let container = Container::new().singleton(Clock(7));

        let a = container.resolve::<Clock>().unwrap();
        let b = container.resolve::<Clock>().unwrap();

        assert_eq!(a.0, 7);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn transient_builds_per_resolution() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let container = Container::new().transient(move || {
            Clock(counter.fetch_add(1, Ordering::SeqCst) as u32)
        });

        let a = container.resolve::<Clock>().unwrap();
        let b = container.resolve::<Clock>().unwrap();

        assert_eq!((a.0, b.0), (0, 1));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_factory_reports_resolution_failure() {
        let container = Container::new().try_transient(|| Err::<Clock, _>("pool exhausted"));

        match container.resolve::<Clock>() {
            Err(BusError::ResolutionFailed { reason, .. }) => assert_eq!(reason, "pool exhausted"),
            other => panic!("expected resolution failure, got {other:?}"),
        }
    }

    #[test]
    fn unregistered_type_fails() {
        let container = Container::new();
        assert!(!container.contains::<Clock>());
        assert!(matches!(
            container.resolve::<Clock>(),
            Err(BusError::ResolutionFailed { .. })
        ));
    }
}
