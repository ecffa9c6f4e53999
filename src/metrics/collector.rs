//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Observador por defecto del servidor: loguea cada evento con `tracing` y
//! agrega contadores y latencias en memoria.

use super::observer::{RequestRecord, ServerObserver};
use crate::workers::PoolStats;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Máximo de latencias a guardar (para calcular percentiles)
const MAX_LATENCIES: usize = 10_000;

/// Collector de métricas thread-safe
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

/// Datos internos de métricas
#[derive(Default)]
struct MetricsData {
    total_requests: u64,

    /// Requests por código de estado
    status_codes: HashMap<u16, u64>,

    /// Latencias registradas en microsegundos (ventana de las últimas `MAX_LATENCIES`)
    latencies: Vec<u64>,

    accepted: u64,
    dropped: u64,
    rejected: u64,
    failed: u64,

    /// Conexiones entregadas a un worker que todavía no terminaron
    in_flight: u64,

    /// Peticiones atendidas en el thread del reactor (caller-runs)
    served_on_reactor: u64,

    last_pool_status: Option<PoolStats>,
}

/// Snapshot de métricas (para uso externo)
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub status_codes: HashMap<u16, u64>,
    pub accepted: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub failed: u64,
    pub in_flight: u64,
    pub served_on_reactor: u64,
    pub latency_p50_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,
    pub latency_avg_us: u64,
    pub pool: Option<PoolStats>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData {
                latencies: Vec::with_capacity(MAX_LATENCIES),
                ..MetricsData::default()
            })),
            start_time: Instant::now(),
        }
    }

    /// Registra un request atendido
    pub fn record_request(&self, status_code: u16, latency: Duration, on_reactor: bool) {
        let mut data = self.inner.lock();

        data.total_requests += 1;
        *data.status_codes.entry(status_code).or_insert(0) += 1;
        data.in_flight = data.in_flight.saturating_sub(1);
        if on_reactor {
            data.served_on_reactor += 1;
        }

        // Si tenemos demasiadas latencias, eliminar las más antiguas
        if data.latencies.len() >= MAX_LATENCIES {
            data.latencies.remove(0);
        }
        data.latencies.push(latency.as_micros() as u64);
    }

    /// Calcula percentiles de latencia: (p50, p95, p99, avg)
    fn calculate_percentiles(latencies: &[u64]) -> (u64, u64, u64, u64) {
        if latencies.is_empty() {
            return (0, 0, 0, 0);
        }

        let mut sorted = latencies.to_vec();
        sorted.sort_unstable();

        let len = sorted.len();
        let p50 = sorted[len * 50 / 100];
        let p95 = sorted[len * 95 / 100];
        let p99 = sorted[len * 99 / 100];
        let avg = sorted.iter().sum::<u64>() / len as u64;

        (p50, p95, p99, avg)
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        let data = self.inner.lock();
        let (p50, p95, p99, avg) = Self::calculate_percentiles(&data.latencies);

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            total_requests: data.total_requests,
            status_codes: data.status_codes.clone(),
            accepted: data.accepted,
            dropped: data.dropped,
            rejected: data.rejected,
            failed: data.failed,
            in_flight: data.in_flight,
            served_on_reactor: data.served_on_reactor,
            latency_p50_us: p50,
            latency_p95_us: p95,
            latency_p99_us: p99,
            latency_avg_us: avg,
            pool: data.last_pool_status.clone(),
        }
    }

    /// Snapshot en JSON (se loguea al apagar el servidor)
    pub fn get_metrics_json(&self) -> String {
        serde_json::to_string_pretty(&self.get_snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerObserver for MetricsCollector {
    fn connection_accepted(&self, peer: SocketAddr) {
        self.inner.lock().accepted += 1;
        tracing::debug!(%peer, "accepted connection");
    }

    fn accept_failed(&self, error: &io::Error) {
        tracing::warn!(%error, "accept failed");
    }

    fn connection_dropped(&self, peer: SocketAddr, reason: &str) {
        self.inner.lock().dropped += 1;
        tracing::debug!(%peer, reason, "connection dropped");
    }

    fn connection_dispatched(&self, peer: SocketAddr) {
        self.inner.lock().in_flight += 1;
        tracing::trace!(%peer, "connection dispatched");
    }

    fn connection_rejected(&self, peer: SocketAddr) {
        let mut data = self.inner.lock();
        data.rejected += 1;
        data.in_flight = data.in_flight.saturating_sub(1);
        tracing::warn!(%peer, "dispatcher saturated, connection rejected");
    }

    fn request_completed(&self, record: &RequestRecord) {
        let on_reactor = record.worker == crate::server::REACTOR_THREAD_NAME;
        self.record_request(record.status, record.latency, on_reactor);
        tracing::info!(
            peer = %record.peer,
            method = %record.method,
            path = %record.path,
            status = record.status,
            latency_ms = record.latency.as_secs_f64() * 1000.0,
            worker = %record.worker,
            "request served"
        );
    }

    fn connection_failed(&self, peer: SocketAddr, error: &io::Error) {
        let mut data = self.inner.lock();
        data.failed += 1;
        data.in_flight = data.in_flight.saturating_sub(1);
        tracing::warn!(%peer, %error, "connection failed");
    }

    fn pool_status(&self, stats: &PoolStats) {
        tracing::debug!(
            pool = %stats.name,
            active = stats.active(),
            workers = stats.workers,
            queued = stats.queued,
            submitted = stats.submitted,
            completed = stats.completed,
            caller_runs = stats.caller_runs,
            "pool status"
        );
        self.inner.lock().last_pool_status = Some(stats.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: u16, micros: u64, worker: &str) -> RequestRecord {
        RequestRecord {
            peer: "127.0.0.1:4000".parse().unwrap(),
            method: "GET".to_string(),
            path: "/".to_string(),
            status,
            latency: Duration::from_micros(micros),
            worker: worker.to_string(),
        }
    }

    #[test]
    fn test_metrics_collector() {
        let collector = MetricsCollector::new();

        collector.request_completed(&record(200, 10, "conn-0"));
        collector.request_completed(&record(200, 20, "conn-1"));
        collector.request_completed(&record(404, 5, "conn-0"));

        let snapshot = collector.get_snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.status_codes.get(&200), Some(&2));
        assert_eq!(snapshot.status_codes.get(&404), Some(&1));
    }

    #[test]
    fn test_percentiles() {
        let collector = MetricsCollector::new();

        for i in 1..=100 {
            collector.record_request(200, Duration::from_micros(i), false);
        }

        let snapshot = collector.get_snapshot();
        assert!(snapshot.latency_p50_us > 0);
        assert!(snapshot.latency_p95_us > snapshot.latency_p50_us);
        assert!(snapshot.latency_p99_us > snapshot.latency_p95_us);
    }

    #[test]
    fn test_served_on_reactor_counted() {
        let collector = MetricsCollector::new();

        collector.request_completed(&record(200, 10, crate::server::REACTOR_THREAD_NAME));
        collector.request_completed(&record(200, 10, "conn-3"));

        assert_eq!(collector.get_snapshot().served_on_reactor, 1);
    }

    #[test]
    fn test_in_flight_tracking() {
        let collector = MetricsCollector::new();
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        collector.connection_dispatched(peer);
        collector.connection_dispatched(peer);
        assert_eq!(collector.get_snapshot().in_flight, 2);

        collector.request_completed(&record(200, 10, "conn-0"));
        collector.connection_failed(peer, &io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(collector.get_snapshot().in_flight, 0);

        // Nunca negativo
        collector.connection_failed(peer, &io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(collector.get_snapshot().in_flight, 0);
    }

    #[test]
    fn test_pool_status_is_kept() {
        let collector = MetricsCollector::new();
        let stats = PoolStats {
            name: "conn".to_string(),
            workers: 4,
            idle: 1,
            queued: 0,
            submitted: 10,
            completed: 9,
            caller_runs: 2,
            rejected: 0,
        };

        collector.pool_status(&stats);
        assert_eq!(collector.get_snapshot().pool, Some(stats));
    }

    #[test]
    fn test_json_format() {
        let collector = MetricsCollector::new();
        collector.record_request(200, Duration::from_millis(50), false);

        let json: serde_json::Value = serde_json::from_str(&collector.get_metrics_json()).unwrap();
        assert_eq!(json["total_requests"], 1);
        assert!(json["latency_p50_us"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_latency_window_management() {
        let collector = MetricsCollector::new();

        for i in 0..15_000 {
            collector.record_request(200, Duration::from_micros(i), false);
        }

        let snapshot = collector.get_snapshot();
        assert_eq!(snapshot.total_requests, 15_000);
    }
}
