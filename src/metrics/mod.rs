//! # Observabilidad
//! src/metrics/mod.rs
//!
//! - `observer`: trait `ServerObserver` que reciben el reactor y los workers
//! - `collector`: observador por defecto (logs con `tracing` + contadores,
//!   latencias p50/p95/p99 y último estado del pool)

pub mod collector;
pub mod observer;

pub use collector::{MetricsCollector, MetricsSnapshot};
pub use observer::{NoopObserver, RequestRecord, ServerObserver};
