//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor con soporte para argumentos CLI y variables de
//! entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./reactor_http_server --port 8080 \
//!   --public-dir ./public \
//!   --users-file ./data/users.json \
//!   --min-workers 10 --max-workers 64 \
//!   --backpressure caller-runs
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 HTTP_HOST=0.0.0.0 PUBLIC_DIR=/srv/www ./reactor_http_server
//! ```

use crate::router::RouterConfig;
use crate::server::HandlerConfig;
use crate::workers::{BackpressurePolicy, PoolConfig};
use clap::Parser;
use std::time::Duration;

/// Configuración del servidor HTTP
#[derive(Debug, Clone, Parser)]
#[command(name = "reactor_http_server")]
#[command(about = "Servidor HTTP con reactor, pool de workers y caches acotadas")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Directorio raíz de los archivos estáticos
    #[arg(long = "public-dir", default_value = "./public", env = "PUBLIC_DIR")]
    pub public_dir: String,

    /// Archivo JSON con los usuarios (nombre → email)
    #[arg(long = "users-file", default_value = "./data/users.json", env = "USERS_FILE")]
    pub users_file: String,

    // === Dispatcher ===

    /// Workers de conexión que se crean al inicio
    #[arg(long = "min-workers", default_value = "10", env = "MIN_WORKERS")]
    pub min_workers: usize,

    /// Máximo de workers de conexión
    #[arg(long = "max-workers", default_value = "64", env = "MAX_WORKERS")]
    pub max_workers: usize,

    /// Ignora `--max-workers`: el Dispatcher crece sin límite
    #[arg(long = "unbounded-workers", env = "UNBOUNDED_WORKERS")]
    pub unbounded_workers: bool,

    /// Segundos que un worker extra espera trabajo antes de terminar
    #[arg(long = "idle-timeout-secs", default_value = "60", env = "IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: u64,

    /// Qué hacer cuando todos los workers están ocupados
    #[arg(long, value_enum, default_value = "caller-runs", env = "BACKPRESSURE")]
    pub backpressure: BackpressurePolicy,

    // === Caches ===

    /// Entradas máximas en la cache de archivos
    #[arg(long = "file-cache-capacity", default_value = "100", env = "FILE_CACHE_CAPACITY")]
    pub file_cache_capacity: usize,

    /// Entradas máximas en la cache de lookups
    #[arg(long = "query-cache-capacity", default_value = "100", env = "QUERY_CACHE_CAPACITY")]
    pub query_cache_capacity: usize,

    /// Workers que leen archivos para la cache
    #[arg(long = "file-workers", default_value = "4", env = "FILE_WORKERS")]
    pub file_workers: usize,

    /// Workers que consultan el datastore para la cache
    #[arg(long = "datastore-workers", default_value = "4", env = "DATASTORE_WORKERS")]
    pub datastore_workers: usize,

    // === Conexiones ===

    /// Tamaño máximo del head de una petición
    #[arg(long = "max-head-bytes", default_value = "8192", env = "MAX_HEAD_BYTES")]
    pub max_head_bytes: usize,

    /// Timeout de lectura/escritura del socket en milisegundos
    #[arg(long = "io-timeout-ms", default_value = "30000", env = "IO_TIMEOUT_MS")]
    pub io_timeout_ms: u64,

    // === Ruteo ===

    /// Path que se responde con un lookup al datastore
    #[arg(long = "lookup-path", default_value = "/query", env = "LOOKUP_PATH")]
    pub lookup_path: String,

    /// Archivo servido para "/"
    #[arg(long = "index-document", default_value = "index.html", env = "INDEX_DOCUMENT")]
    pub index_document: String,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use reactor_http_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        // Validar workers
        if self.min_workers == 0 {
            return Err("Min workers must be >= 1".to_string());
        }
        if !self.unbounded_workers && self.max_workers < self.min_workers {
            return Err("Max workers must be >= min workers".to_string());
        }
        if self.file_workers == 0 {
            return Err("File workers must be >= 1".to_string());
        }
        if self.datastore_workers == 0 {
            return Err("Datastore workers must be >= 1".to_string());
        }
        if self.idle_timeout_secs == 0 {
            return Err("Idle timeout must be > 0".to_string());
        }

        // Validar caches
        if self.file_cache_capacity == 0 {
            return Err("File cache capacity must be >= 1".to_string());
        }
        if self.query_cache_capacity == 0 {
            return Err("Query cache capacity must be >= 1".to_string());
        }

        // Validar conexiones
        if self.max_head_bytes == 0 {
            return Err("Max head bytes must be > 0".to_string());
        }
        if self.io_timeout_ms == 0 {
            return Err("IO timeout must be > 0".to_string());
        }

        // Validar ruteo
        if !self.lookup_path.starts_with('/') {
            return Err("Lookup path must start with '/'".to_string());
        }
        if self.index_document.is_empty() || self.index_document.contains("..") {
            return Err("Index document must be a plain file name".to_string());
        }

        Ok(())
    }

    /// Configuración del Dispatcher
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            name: "conn".to_string(),
            min_workers: self.min_workers,
            max_workers: if self.unbounded_workers {
                None
            } else {
                Some(self.max_workers)
            },
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            policy: self.backpressure,
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            lookup_path: self.lookup_path.clone(),
            index_document: self.index_document.trim_start_matches('/').to_string(),
            ..RouterConfig::default()
        }
    }

    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            max_head_bytes: self.max_head_bytes,
            io_timeout: Duration::from_millis(self.io_timeout_ms),
        }
    }

    /// Loguea un resumen de la configuración
    pub fn print_summary(&self) {
        let max_workers = if self.unbounded_workers {
            "unbounded".to_string()
        } else {
            self.max_workers.to_string()
        };

        tracing::info!(
            address = %self.address(),
            public_dir = %self.public_dir,
            users_file = %self.users_file,
            "network"
        );
        tracing::info!(
            min = self.min_workers,
            max = %max_workers,
            idle_timeout_secs = self.idle_timeout_secs,
            backpressure = %self.backpressure,
            "dispatcher"
        );
        tracing::info!(
            file_capacity = self.file_cache_capacity,
            file_workers = self.file_workers,
            query_capacity = self.query_cache_capacity,
            datastore_workers = self.datastore_workers,
            "caches"
        );
        tracing::info!(
            max_head_bytes = self.max_head_bytes,
            io_timeout_ms = self.io_timeout_ms,
            lookup_path = %self.lookup_path,
            index_document = %self.index_document,
            "connections"
        );
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            public_dir: "./public".to_string(),
            users_file: "./data/users.json".to_string(),
            min_workers: 10,
            max_workers: 64,
            unbounded_workers: false,
            idle_timeout_secs: 60,
            backpressure: BackpressurePolicy::CallerRuns,
            file_cache_capacity: 100,
            query_cache_capacity: 100,
            file_workers: 4,
            datastore_workers: 4,
            max_head_bytes: 8192,
            io_timeout_ms: 30_000,
            lookup_path: "/query".to_string(),
            index_document: "index.html".to_string(),
        }
    }
}
