//! # Pools de Workers
//! src/workers/mod.rs
//!
//! El servidor usa tres instancias independientes del mismo pool:
//!
//! - `conn`: atiende conexiones (el Dispatcher del reactor)
//! - `files`: lecturas de disco para la cache de archivos estáticos
//! - `datastore`: consultas al datastore, para que una base lenta no
//!   deje sin workers al servicio de archivos ni al accept loop

pub mod pool;

pub use pool::{BackpressurePolicy, Dispatch, Job, PoolConfig, PoolStats, RejectedJob, WorkerPool};
