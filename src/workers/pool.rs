//! # Pool de Workers con Backpressure
//! src/workers/pool.rs
//!
//! Pool de threads con tamaño mínimo/máximo, timeout de inactividad y una
//! política explícita para cuando todos los workers están ocupados.
//!
//! ## Decisión de `submit`
//!
//! ```text
//! ¿hay workers ociosos de sobra? ── sí ──► encolar y despertar uno   (Queued)
//!          │ no
//! ¿workers < max? ───────────────── sí ──► crear worker nuevo         (Spawned)
//!          │ no (saturado)
//! política:  QueueUnbounded ──► encolar                              (Queued)
//!            CallerRuns     ──► ejecutar en el thread que llamó      (RanOnCaller)
//!            Reject         ──► Err(RejectedJob)
//! ```
//!
//! `CallerRuns` es el default del servidor y su único control de admisión:
//! bajo sobrecarga el propio reactor atiende la conexión, lo que frena el
//! loop de accept/readiness y con eso la entrada de conexiones nuevas. Es
//! intencional, no un bug.

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Unidad de trabajo que se ejecuta una sola vez en algún worker
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Qué hacer cuando el pool está saturado (todos ocupados y en el máximo)
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackpressurePolicy {
    /// Encolar sin límite
    #[value(name = "queue")]
    QueueUnbounded,

    /// Ejecutar el job sincrónicamente en el thread que hizo `submit`
    #[value(name = "caller-runs")]
    CallerRuns,

    /// Devolver el job al llamador
    #[value(name = "reject")]
    Reject,
}

impl std::fmt::Display for BackpressurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackpressurePolicy::QueueUnbounded => "queue",
            BackpressurePolicy::CallerRuns => "caller-runs",
            BackpressurePolicy::Reject => "reject",
        };
        f.write_str(name)
    }
}

/// Configuración de un pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Prefijo de los nombres de thread (ej: "conn" → "conn-0", "conn-1")
    pub name: String,

    /// Workers que se crean al inicio y nunca expiran
    pub min_workers: usize,

    /// Máximo de workers; `None` = sin límite
    pub max_workers: Option<usize>,

    /// Tiempo que un worker por encima del mínimo espera trabajo antes de terminar
    pub idle_timeout: Duration,

    pub policy: BackpressurePolicy,
}

impl PoolConfig {
    /// Pool de tamaño fijo que encola sin límite (usado para los pools de las caches)
    pub fn fixed(name: &str, workers: usize) -> Self {
        Self {
            name: name.to_string(),
            min_workers: workers,
            max_workers: Some(workers),
            idle_timeout: Duration::from_secs(60),
            policy: BackpressurePolicy::QueueUnbounded,
        }
    }
}

/// Cómo terminó un `submit` exitoso
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// El job quedó en la cola para un worker existente
    Queued,
    /// Se creó un worker nuevo para el job
    Spawned,
    /// El job ya se ejecutó en el thread del llamador
    RanOnCaller,
}

/// Job rechazado por saturación (política `Reject`) o porque el pool se apagó
#[derive(thiserror::Error)]
#[error("worker pool `{pool}` rejected the job")]
pub struct RejectedJob {
    pool: String,
    job: Job,
}

impl RejectedJob {
    /// Recupera el job para que el llamador decida qué hacer con él
    pub fn into_job(self) -> Job {
        self.job
    }
}

impl std::fmt::Debug for RejectedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RejectedJob").field("pool", &self.pool).finish_non_exhaustive()
    }
}

/// Estadísticas de un pool (se loguean después de cada vuelta del reactor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub name: String,
    pub workers: usize,
    pub idle: usize,
    pub queued: usize,
    pub submitted: u64,
    pub completed: u64,
    pub caller_runs: u64,
    pub rejected: u64,
}

impl PoolStats {
    /// Workers ejecutando un job en este momento
    pub fn active(&self) -> usize {
        self.workers.saturating_sub(self.idle)
    }
}

/// Estado protegido por el mutex del pool
struct PoolState {
    queue: VecDeque<Job>,
    workers: usize,
    idle: usize,
    shutdown: bool,
}

struct Shared {
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
    next_id: AtomicUsize,
    submitted: AtomicU64,
    completed: AtomicU64,
    caller_runs: AtomicU64,
    rejected: AtomicU64,
}

/// Pool de workers. Clonar es barato: todos los clones comparten los mismos threads.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Crea el pool y arranca `min_workers` threads
    pub fn new(config: PoolConfig) -> Self {
        let min_workers = config.min_workers;
        let pool = Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    workers: 0,
                    idle: 0,
                    shutdown: false,
                }),
                available: Condvar::new(),
                next_id: AtomicUsize::new(0),
                submitted: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                caller_runs: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
            }),
        };

        for _ in 0..min_workers {
            let mut state = pool.shared.state.lock();
            state.workers += 1;
            if !Shared::spawn_worker(&pool.shared) {
                state.workers -= 1;
            }
        }

        pool
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.shared.config.policy
    }

    /// Entrega un job al pool. Nunca bloquea esperando lugar en una cola.
    pub fn submit<F>(&self, job: F) -> Result<Dispatch, RejectedJob>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_boxed(Box::new(job))
    }

    /// Igual que [`WorkerPool::submit`] pero con el job ya en una caja
    pub fn submit_boxed(&self, job: Job) -> Result<Dispatch, RejectedJob> {
        let shared = &self.shared;
        let mut state = shared.state.lock();

        if state.shutdown {
            shared.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(RejectedJob {
                pool: shared.config.name.clone(),
                job,
            });
        }

        shared.submitted.fetch_add(1, Ordering::Relaxed);

        // Cada job encolado necesita su propio worker ocioso
        if state.idle > state.queue.len() {
            state.queue.push_back(job);
            shared.available.notify_one();
            return Ok(Dispatch::Queued);
        }

        let below_max = shared
            .config
            .max_workers
            .map_or(true, |max| state.workers < max);

        if below_max {
            state.queue.push_back(job);
            state.workers += 1;
            if Shared::spawn_worker(shared) {
                return Ok(Dispatch::Spawned);
            }
            state.workers -= 1;

            // Sin thread nuevo: si queda algún worker, el job espera en la cola
            if state.workers > 0 {
                return Ok(Dispatch::Queued);
            }
            let job = state.queue.pop_back();
            drop(state);
            if let Some(job) = job {
                shared.caller_runs.fetch_add(1, Ordering::Relaxed);
                shared.run(job);
            }
            return Ok(Dispatch::RanOnCaller);
        }

        match shared.config.policy {
            BackpressurePolicy::QueueUnbounded => {
                state.queue.push_back(job);
                shared.available.notify_one();
                Ok(Dispatch::Queued)
            }
            BackpressurePolicy::CallerRuns => {
                drop(state);
                shared.caller_runs.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(pool = %shared.config.name, "pool saturated, running job on caller");
                shared.run(job);
                Ok(Dispatch::RanOnCaller)
            }
            BackpressurePolicy::Reject => {
                shared.submitted.fetch_sub(1, Ordering::Relaxed);
                shared.rejected.fetch_add(1, Ordering::Relaxed);
                Err(RejectedJob {
                    pool: shared.config.name.clone(),
                    job,
                })
            }
        }
    }

    /// Snapshot de los contadores del pool
    pub fn stats(&self) -> PoolStats {
        let shared = &self.shared;
        let state = shared.state.lock();

        PoolStats {
            name: shared.config.name.clone(),
            workers: state.workers,
            idle: state.idle,
            queued: state.queue.len(),
            submitted: shared.submitted.load(Ordering::Relaxed),
            completed: shared.completed.load(Ordering::Relaxed),
            caller_runs: shared.caller_runs.load(Ordering::Relaxed),
            rejected: shared.rejected.load(Ordering::Relaxed),
        }
    }

    /// Deja de aceptar jobs. Los workers terminan cuando la cola se vacía.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        state.shutdown = true;
        self.shared.available.notify_all();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.shared.config)
            .finish()
    }
}

impl Shared {
    /// Crea un thread worker. El llamador ya contó el worker en `state.workers`.
    fn spawn_worker(shared: &Arc<Shared>) -> bool {
        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        let thread_name = format!("{}-{}", shared.config.name, id);
        let worker_shared = Arc::clone(shared);

        match thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || Shared::worker_loop(worker_shared))
        {
            Ok(_) => {
                tracing::trace!(worker = %thread_name, "worker started");
                true
            }
            Err(e) => {
                tracing::warn!(worker = %thread_name, error = %e, "failed to spawn worker");
                false
            }
        }
    }

    /// Loop principal del worker
    fn worker_loop(shared: Arc<Shared>) {
        let mut state = shared.state.lock();

        loop {
            if let Some(job) = state.queue.pop_front() {
                MutexGuard::unlocked(&mut state, || shared.run(job));
                continue;
            }

            if state.shutdown {
                break;
            }

            state.idle += 1;
            let result = shared
                .available
                .wait_for(&mut state, shared.config.idle_timeout);
            state.idle -= 1;

            if result.timed_out()
                && state.queue.is_empty()
                && state.workers > shared.config.min_workers
            {
                break;
            }
        }

        state.workers -= 1;
        tracing::trace!(pool = %shared.config.name, "worker exiting");
    }

    /// Ejecuta un job aislando panics para no perder el worker
    fn run(&self, job: Job) {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(pool = %self.config.name, "job panicked");
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}
