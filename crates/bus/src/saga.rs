//! Saga lifecycle tracking.
//!
//! Every (saga type, correlation id) pair owns one slot. A slot records the
//! lifecycle status and serialises invocations of that pair: two messages for
//! the same correlation never run the same saga concurrently, while distinct
//! correlations proceed in parallel.
//!
//! A saga invocation may send further messages through the bus. Keys already
//! held by the current delivery are tracked in a task-local set so a nested
//! delivery that routes back to the same slot does not wait on itself.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use common::AggregateId;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;

tokio::task_local! {
    static HELD: RefCell<HashSet<SagaKey>>;
}

/// Lifecycle of one saga correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SagaStatus {
    /// No start has succeeded for this correlation.
    #[default]
    NotStarted,

    /// Accepting continuations.
    Running,

    /// Finished; continuations are dropped until a new start.
    Completed,
}

impl SagaStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, SagaStatus::Running)
    }

    /// Returns true once the saga has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::NotStarted => "NotStarted",
            SagaStatus::Running => "Running",
            SagaStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one saga instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SagaKey {
    pub saga: TypeId,
    pub correlation: AggregateId,
}

impl SagaKey {
    pub fn new(saga: TypeId, correlation: AggregateId) -> Self {
        Self { saga, correlation }
    }

    /// Key for saga type `S` correlated by `correlation`.
    pub fn of<S: 'static>(correlation: AggregateId) -> Self {
        Self::new(TypeId::of::<S>(), correlation)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Lifecycle {
    status: SagaStatus,
    completed_at: Option<Instant>,
}

#[derive(Default)]
struct SagaSlot {
    lifecycle: StdMutex<Lifecycle>,
    gate: Arc<Mutex<()>>,
}

impl SagaSlot {
    fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: SagaStatus) {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        lifecycle.status = status;
        lifecycle.completed_at = (status == SagaStatus::Completed).then(Instant::now);
    }
}

/// Exclusive access to one saga slot for the duration of an invocation.
///
/// Reentrant entries share the outer entry's access and release nothing on
/// drop.
pub(crate) struct SagaGuard {
    key: SagaKey,
    slot: Arc<SagaSlot>,
    gate: Option<OwnedMutexGuard<()>>,
}

impl SagaGuard {
    pub(crate) fn status(&self) -> SagaStatus {
        self.slot.lifecycle().status
    }

    pub(crate) fn set_status(&self, status: SagaStatus) {
        self.slot.set_status(status);
    }
}

impl Drop for SagaGuard {
    fn drop(&mut self) {
        if self.gate.is_some() {
            let _ = HELD.try_with(|held| held.borrow_mut().remove(&self.key));
        }
    }
}

/// Status table for every saga correlation the bus has seen.
#[derive(Default)]
pub struct SagaStore {
    slots: RwLock<HashMap<SagaKey, Arc<SagaSlot>>>,
}

impl SagaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status of `key`, `NotStarted` if it was never seen.
    pub async fn status(&self, key: SagaKey) -> SagaStatus {
        self.slots
            .read()
            .await
            .get(&key)
            .map(|slot| slot.lifecycle().status)
            .unwrap_or_default()
    }

    /// Number of tracked correlations.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    /// Drops slots that have been completed for at least `retention`, along
    /// with slots that never started. Slots in use are kept.
    pub async fn purge(&self, retention: Duration) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let lifecycle = slot.lifecycle();
            match lifecycle.status {
                SagaStatus::Running => true,
                SagaStatus::NotStarted => false,
                SagaStatus::Completed => lifecycle
                    .completed_at
                    .is_some_and(|at| at.elapsed() < retention),
            }
        });
        before - slots.len()
    }

    /// Records `status` for a correlation the store has never seen, as when
    /// lifecycles are rebuilt from the log after a restart.
    ///
    /// Returns false, changing nothing, when `key` is already tracked.
    pub async fn restore(&self, key: SagaKey, status: SagaStatus) -> bool {
        let mut slots = self.slots.write().await;
        if slots.contains_key(&key) {
            return false;
        }
        let slot = SagaSlot::default();
        slot.set_status(status);
        slots.insert(key, Arc::new(slot));
        true
    }

    /// Takes exclusive access to `key`, creating its slot if needed.
    pub(crate) async fn enter_or_create(&self, key: SagaKey) -> SagaGuard {
        let slot = Arc::clone(self.slots.write().await.entry(key).or_default());
        Self::lock(key, slot).await
    }

    /// Takes exclusive access to `key` if a slot exists for it.
    pub(crate) async fn enter_existing(&self, key: SagaKey) -> Option<SagaGuard> {
        let slot = Arc::clone(self.slots.read().await.get(&key)?);
        Some(Self::lock(key, slot).await)
    }

    async fn lock(key: SagaKey, slot: Arc<SagaSlot>) -> SagaGuard {
        let reentrant = HELD
            .try_with(|held| held.borrow().contains(&key))
            .unwrap_or(false);
        if reentrant {
            return SagaGuard {
                key,
                slot,
                gate: None,
            };
        }

        let gate = Arc::clone(&slot.gate).lock_owned().await;
        let _ = HELD.try_with(|held| held.borrow_mut().insert(key));
        SagaGuard {
            key,
            slot,
            gate: Some(gate),
        }
    }

    /// Runs `delivery` with a fresh held-key scope unless one is active.
    pub(crate) async fn scoped<F: Future>(delivery: F) -> F::Output {
        if HELD.try_with(|_| ()).is_ok() {
            delivery.await
        } else {
            HELD.scope(RefCell::new(HashSet::new()), delivery).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter;

    #[tokio::test]
    async fn unknown_key_is_not_started() {
        let store = SagaStore::new();
        assert_eq!(
            store.status(SagaKey::of::<Greeter>(AggregateId::new())).await,
            SagaStatus::NotStarted
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn enter_without_create_skips_missing_slot() {
        let store = SagaStore::new();
        let key = SagaKey::of::<Greeter>(AggregateId::new());

        assert!(store.enter_existing(key).await.is_none());
        drop(store.enter_or_create(key).await);
        assert!(store.enter_existing(key).await.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn status_transitions_are_visible() {
        let store = SagaStore::new();
        let key = SagaKey::of::<Greeter>(AggregateId::new());

        let guard = store.enter_or_create(key).await;
        guard.set_status(SagaStatus::Running);
        drop(guard);

        assert!(store.status(key).await.is_running());
    }

    #[tokio::test]
    async fn same_key_is_serialised() {
        let store = Arc::new(SagaStore::new());
        let key = SagaKey::of::<Greeter>(AggregateId::new());

        let first = store.enter_or_create(key).await;

        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { drop(store.enter_or_create(key).await) })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn reentrant_entry_does_not_wait() {
        let store = SagaStore::new();
        let key = SagaKey::of::<Greeter>(AggregateId::new());

        SagaStore::scoped(async {
            let outer = store.enter_or_create(key).await;
            let inner = store.enter_or_create(key).await;
            assert!(inner.gate.is_none());
            drop(inner);
            drop(outer);
        })
        .await;
    }

    #[tokio::test]
    async fn restore_only_fills_unknown_keys() {
        let store = SagaStore::new();
        let fresh = SagaKey::of::<Greeter>(AggregateId::new());
        let live = SagaKey::of::<Greeter>(AggregateId::new());
        store
            .enter_or_create(live)
            .await
            .set_status(SagaStatus::Completed);

        assert!(store.restore(fresh, SagaStatus::Running).await);
        assert!(!store.restore(live, SagaStatus::Running).await);

        assert!(store.status(fresh).await.is_running());
        assert_eq!(store.status(live).await, SagaStatus::Completed);
        assert!(store.enter_existing(fresh).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_respects_retention() {
        let store = SagaStore::new();
        let done = SagaKey::of::<Greeter>(AggregateId::new());
        let running = SagaKey::of::<Greeter>(AggregateId::new());

        store
            .enter_or_create(done)
            .await
            .set_status(SagaStatus::Completed);
        store
            .enter_or_create(running)
            .await
            .set_status(SagaStatus::Running);

        assert_eq!(store.purge(Duration::from_secs(60)).await, 0);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.purge(Duration::from_secs(60)).await, 1);
        assert_eq!(store.status(done).await, SagaStatus::NotStarted);
        assert!(store.status(running).await.is_running());
    }
}
