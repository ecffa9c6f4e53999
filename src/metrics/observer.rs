//! # Observador del Servidor
//! src/metrics/observer.rs
//!
//! El reactor y los workers no imprimen nada: reportan eventos a un
//! `ServerObserver` inyectado. Todos los métodos tienen implementación vacía,
//! así un observador de prueba solo sobrescribe lo que le interesa.

use crate::workers::PoolStats;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Resumen de una petición atendida
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub peer: SocketAddr,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency: Duration,
    /// Nombre del thread que atendió la conexión
    pub worker: String,
}

/// Eventos que emiten el reactor y los workers de conexión
pub trait ServerObserver: Send + Sync {
    /// Nueva conexión aceptada y registrada para lectura
    fn connection_accepted(&self, _peer: SocketAddr) {}

    /// Falló `accept` en el socket de escucha
    fn accept_failed(&self, _error: &io::Error) {}

    /// La conexión se descartó antes de llegar a un worker
    fn connection_dropped(&self, _peer: SocketAddr, _reason: &str) {}

    /// La conexión se entregó al Dispatcher
    fn connection_dispatched(&self, _peer: SocketAddr) {}

    /// El Dispatcher rechazó la conexión (política `Reject`)
    fn connection_rejected(&self, _peer: SocketAddr) {}

    /// Petición respondida
    fn request_completed(&self, _record: &RequestRecord) {}

    /// Error de IO mientras un worker atendía la conexión
    fn connection_failed(&self, _peer: SocketAddr, _error: &io::Error) {}

    /// Estado del pool de conexiones, reportado después de cada vuelta del reactor
    fn pool_status(&self, _stats: &PoolStats) {}
}

/// Observador que no hace nada
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ServerObserver for NoopObserver {}
