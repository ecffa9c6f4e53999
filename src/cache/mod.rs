//! # Cache Asíncrona Acotada
//! src/cache/mod.rs
//!
//! Cache genérica compartida por los dos responders (cada uno con su propia
//! instancia, capacidad y pool de cómputo):
//!
//! ```text
//! get_or_compute(key) ──► ¿entrada viva? ── sí ──► handle existente
//!                               │ no
//!                               ▼
//!                  instalar slot Pending + encolar key (+ desalojar)
//!                               │
//!                               ▼
//!                  pool.submit(compute) ──► slot Resolved ──► notify_all
//! ```

pub mod bounded;
pub mod handle;

pub use bounded::{BoundedAsyncCache, CacheStats};
pub use handle::{CacheHandle, ComputePanicked};
