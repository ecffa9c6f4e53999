//! # Reactor HTTP Server - Entry Point
//! src/main.rs
//!
//! Parsea la configuración (CLI + env), inicializa `tracing` y corre el
//! servidor hasta que el reactor termine.

use clap::Parser;
use reactor_http_server::config::Config;
use reactor_http_server::metrics::MetricsCollector;
use reactor_http_server::server::Server;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_thread_names(true)
        .init();

    let config = Config::parse();
    config.print_summary();

    let metrics = MetricsCollector::new();

    let result = Server::new(config).and_then(|server| {
        server
            .with_observer(Arc::new(metrics.clone()))
            .run()
    });

    tracing::info!(metrics = %metrics.get_metrics_json(), "final metrics");

    if let Err(e) = result {
        tracing::error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}
