//! # Reactor HTTP Server
//! src/lib.rs
//!
//! Servidor HTTP/1.1 (una petición por conexión) con un reactor de readiness,
//! un pool de workers elástico con backpressure y caches acotadas que
//! coalescen cálculos concurrentes de la misma key.
//!
//! ## Arquitectura
//!
//! - `http`: parsing de requests y serialización de responses
//! - `server`: reactor, máquina de estados por conexión y armado del servidor
//! - `workers`: pool de workers (Dispatcher) con políticas de backpressure
//! - `cache`: `BoundedAsyncCache` con eviction FIFO
//! - `storage`: colaboradores externos (archivos, datastore de usuarios)
//! - `responders`: archivos estáticos y lookups, cada uno con su cache
//! - `router`: despacho por path
//! - `metrics`: observador del servidor y métricas
//! - `config`, `error`
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use reactor_http_server::config::Config;
//! use reactor_http_server::server::Server;
//!
//! let server = Server::new(Config::default()).expect("invalid setup");
//! let running = server.start().expect("failed to start");
//! println!("listening on {}", running.local_addr());
//! running.wait().expect("reactor failed");
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod responders;
pub mod router;
pub mod server;
pub mod storage;
pub mod workers;
