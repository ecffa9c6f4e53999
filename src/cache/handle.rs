//! # Handle de una entrada de cache
//! src/cache/handle.rs
//!
//! Cada entrada es un slot con estado `Pending` o `Resolved`. Todos los
//! handles emitidos para la misma key comparten el slot, así que todos
//! observan la misma (única) resolución.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Resultado guardado cuando la función de cómputo hace panic
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cache computation panicked")]
pub struct ComputePanicked;

enum SlotState<V, E> {
    Pending,
    Resolved(Result<V, E>),
}

/// Slot compartido entre la cache, el job de cómputo y los handles
pub(crate) struct Slot<V, E> {
    state: Mutex<SlotState<V, E>>,
    resolved: Condvar,
}

impl<V, E> Slot<V, E> {
    pub(crate) fn pending() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            resolved: Condvar::new(),
        }
    }

    /// Reemplaza el marcador `Pending` y despierta a todos los que esperan.
    /// Una segunda resolución se ignora.
    pub(crate) fn resolve(&self, outcome: Result<V, E>) {
        let mut state = self.state.lock();
        if let SlotState::Pending = *state {
            *state = SlotState::Resolved(outcome);
            self.resolved.notify_all();
        }
    }
}

/// Handle a un valor que puede estar todavía en cómputo
pub struct CacheHandle<V, E> {
    slot: Arc<Slot<V, E>>,
}

impl<V, E> Clone for CacheHandle<V, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<V, E> CacheHandle<V, E> {
    pub(crate) fn new(slot: Arc<Slot<V, E>>) -> Self {
        Self { slot }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.slot.state.lock(), SlotState::Resolved(_))
    }

    /// `true` si ambos handles apuntan a la misma entrada
    pub fn same_entry(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<V: Clone, E: Clone> CacheHandle<V, E> {
    /// Bloquea hasta que la entrada se resuelva
    pub fn wait(&self) -> Result<V, E> {
        let mut state = self.slot.state.lock();
        loop {
            if let SlotState::Resolved(outcome) = &*state {
                return outcome.clone();
            }
            self.slot.resolved.wait(&mut state);
        }
    }

    /// Como [`CacheHandle::wait`], pero se rinde después de `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<V, E>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.state.lock();
        loop {
            if let SlotState::Resolved(outcome) = &*state {
                return Some(outcome.clone());
            }
            if self.slot.resolved.wait_until(&mut state, deadline).timed_out() {
                return match &*state {
                    SlotState::Resolved(outcome) => Some(outcome.clone()),
                    SlotState::Pending => None,
                };
            }
        }
    }

    /// Lectura sin bloquear; `None` mientras siga pendiente
    pub fn try_get(&self) -> Option<Result<V, E>> {
        match &*self.slot.state.lock() {
            SlotState::Resolved(outcome) => Some(outcome.clone()),
            SlotState::Pending => None,
        }
    }
}

impl<V, E> std::fmt::Debug for CacheHandle<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
