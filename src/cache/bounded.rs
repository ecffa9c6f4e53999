//! # Cache Coalescente con Desalojo FIFO
//! src/cache/bounded.rs
//!
//! `get_or_compute` garantiza a lo sumo un cómputo en vuelo por key: la
//! verificación "¿existe?" y la instalación del slot pendiente ocurren en la
//! misma sección crítica. El cómputo corre en el pool asignado a la cache.
//!
//! ## Desalojo
//!
//! Cada key nueva se agrega al final de la cola de desalojo. Si la cola supera
//! la capacidad, se saca la key más antigua y se borra su entrada, aunque siga
//! pendiente. Releer una key no cambia su posición (FIFO, no LRU).
//!
//! Si una key se desaloja mientras su cómputo sigue corriendo, el cómputo
//! termina igual y resuelve su slot para los handles ya emitidos; un pedido
//! posterior de esa key arranca un cómputo nuevo. Bajo mucha rotación eso
//! puede duplicar trabajo, pero nunca da resultados incorrectos.
//!
//! Mapa y cola viven bajo un único mutex: insertar, encolar y desalojar son
//! atómicos entre sí.

use super::handle::{CacheHandle, ComputePanicked, Slot};
use crate::workers::WorkerPool;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct CacheState<K, V, E> {
    entries: HashMap<K, Arc<Slot<V, E>>>,

    /// Keys en orden de inserción; nunca más largo que `capacity`
    order: VecDeque<K>,
}

/// Contadores de una cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub name: String,
    pub capacity: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Cache acotada que coalesce cómputos concurrentes de la misma key
pub struct BoundedAsyncCache<K, V, E> {
    name: String,
    capacity: usize,
    pool: WorkerPool,
    inner: Mutex<CacheState<K, V, E>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V, E> BoundedAsyncCache<K, V, E>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Send + 'static,
    E: From<ComputePanicked> + Send + 'static,
{
    /// Crea una cache vacía de `capacity` entradas que computa en `pool`
    pub fn new(name: &str, capacity: usize, pool: WorkerPool) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            pool,
            inner: Mutex::new(CacheState {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity + 1),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Devuelve el handle de `key`, arrancando `compute` solo si no hay entrada viva
    ///
    /// Los errores de `compute` se guardan igual que los éxitos; no hay
    /// reintentos internos.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> CacheHandle<V, E>
    where
        F: FnOnce() -> Result<V, E> + Send + 'static,
    {
        let slot = {
            let mut state = self.inner.lock();

            if let Some(slot) = state.entries.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return CacheHandle::new(Arc::clone(slot));
            }

            let slot = Arc::new(Slot::pending());
            state.entries.insert(key.clone(), Arc::clone(&slot));
            state.order.push_back(key);

            while state.order.len() > self.capacity {
                if let Some(oldest) = state.order.pop_front() {
                    state.entries.remove(&oldest);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(cache = %self.name, key = ?oldest, "evicted");
                }
            }

            self.misses.fetch_add(1, Ordering::Relaxed);
            slot
        };

        let job_slot = Arc::clone(&slot);
        let job = move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(compute))
                .unwrap_or_else(|_| Err(E::from(ComputePanicked)));
            job_slot.resolve(outcome);
        };

        // Un pool que rechaza no puede dejar el slot pendiente para siempre
        if let Err(rejected) = self.pool.submit(job) {
            tracing::debug!(cache = %self.name, "compute pool rejected job, computing inline");
            (rejected.into_job())();
        }

        CacheHandle::new(slot)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` si hay una entrada viva (pendiente o resuelta) para `key`
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Keys en el orden en que serán desalojadas (la primera es la próxima)
    pub fn keys_in_eviction_order(&self) -> Vec<K> {
        self.inner.lock().order.iter().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name.clone(),
            capacity: self.capacity,
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<K, V, E> std::fmt::Debug for BoundedAsyncCache<K, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedAsyncCache")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("entries", &self.inner.lock().entries.len())
            .finish()
    }
}
