//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Arma el servidor completo a partir de la `Config`:
//!
//! ```text
//!              ┌──────────── Dispatcher ("conn-N") ────────────┐
//! Reactor ───► │ ConnectionHandler ─► Router ─┬─► StaticFileResponder ─► FileCache ("files-N")
//! ("reactor")  └──────────────────────────────┴─► DatastoreResponder  ─► LookupCache ("datastore-N")
//! ```
//!
//! - `connection`: máquina de estados por conexión y ciclo request/response
//! - `reactor`: loop de readiness con `mio`

pub mod connection;
pub mod reactor;

pub use connection::{ConnState, Connection, ConnectionHandler, ConnectionTracker, HandlerConfig};
pub use reactor::{Reactor, ReactorHandle};

use crate::config::Config;
use crate::error::ServerError;
use crate::metrics::{MetricsCollector, ServerObserver};
use crate::responders::{DatastoreResponder, FileCache, LookupCache, StaticFileResponder};
use crate::router::Router;
use crate::storage::{Datastore, DiskFileStore, FileStore, JsonDatastore};
use crate::workers::{PoolConfig, WorkerPool};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Nombre del thread que corre el reactor. Las respuestas servidas con
/// caller-runs llevan este valor en `X-Worker-Thread`.
pub const REACTOR_THREAD_NAME: &str = "reactor";

/// Servidor configurado, todavía sin socket
pub struct Server {
    config: Config,
    file_store: Arc<dyn FileStore>,
    datastore: Arc<dyn Datastore>,
    observer: Arc<dyn ServerObserver>,
}

impl Server {
    /// Servidor con los colaboradores de disco: `public_dir` y `users_file`
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let file_store = Arc::new(DiskFileStore::new(&config.public_dir));
        let datastore = Arc::new(JsonDatastore::open(&config.users_file)?);
        Self::with_collaborators(config, file_store, datastore)
    }

    /// Servidor con colaboradores arbitrarios (otro almacenamiento, pruebas)
    pub fn with_collaborators(
        config: Config,
        file_store: Arc<dyn FileStore>,
        datastore: Arc<dyn Datastore>,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;

        Ok(Self {
            config,
            file_store,
            datastore,
            observer: Arc::new(MetricsCollector::new()),
        })
    }

    /// Reemplaza el observador por defecto (`MetricsCollector`)
    pub fn with_observer(mut self, observer: Arc<dyn ServerObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Hace bind, arma pools/caches/router y lanza el reactor en su propio thread
    pub fn start(self) -> Result<RunningServer, ServerError> {
        let address = self.config.address();
        let listener = TcpListener::bind(&address).map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            address,
            source,
        })?;

        let file_pool = WorkerPool::new(PoolConfig::fixed("files", self.config.file_workers));
        let datastore_pool =
            WorkerPool::new(PoolConfig::fixed("datastore", self.config.datastore_workers));
        let dispatcher = WorkerPool::new(self.config.pool_config());

        let router = Arc::new(Router::new(
            self.config.router_config(),
            StaticFileResponder::new(
                self.file_store,
                FileCache::new("files", self.config.file_cache_capacity, file_pool.clone()),
            ),
            DatastoreResponder::new(
                self.datastore,
                LookupCache::new("lookups", self.config.query_cache_capacity, datastore_pool.clone()),
            ),
        ));

        let tracker = ConnectionTracker::new();
        let handler = Arc::new(ConnectionHandler::new(
            Arc::clone(&router),
            tracker.clone(),
            Arc::clone(&self.observer),
            self.config.handler_config(),
        ));

        let mut reactor = Reactor::new(
            listener,
            dispatcher.clone(),
            handler,
            tracker,
            self.observer,
        )?;
        let handle = reactor.handle();

        let thread = thread::Builder::new()
            .name(REACTOR_THREAD_NAME.to_string())
            .spawn(move || reactor.run())
            .map_err(ServerError::Poll)?;

        tracing::info!(address = %local_addr, "server listening");

        Ok(RunningServer {
            local_addr,
            handle,
            thread,
            router,
            pools: vec![dispatcher, file_pool, datastore_pool],
        })
    }

    /// `start` + esperar a que el reactor termine
    pub fn run(self) -> Result<(), ServerError> {
        self.start()?.wait()
    }
}

/// Servidor aceptando conexiones
pub struct RunningServer {
    local_addr: SocketAddr,
    handle: ReactorHandle,
    thread: JoinHandle<Result<(), ServerError>>,
    router: Arc<Router>,
    pools: Vec<WorkerPool>,
}

impl RunningServer {
    /// Dirección real del socket (útil con puerto 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Pools en orden: dispatcher, archivos, datastore
    pub fn pools(&self) -> &[WorkerPool] {
        &self.pools
    }

    /// Detiene el reactor y espera a que termine
    pub fn shutdown(self) -> Result<(), ServerError> {
        self.handle.shutdown();
        self.wait()
    }

    /// Bloquea hasta que el reactor termine; después apaga los pools
    pub fn wait(self) -> Result<(), ServerError> {
        let result = self.thread.join().map_err(|_| ServerError::ReactorPanicked)?;

        for pool in &self.pools {
            pool.shutdown();
        }

        tracing::info!(
            files = ?self.router.static_files().cache().stats(),
            lookups = ?self.router.datastore().cache().stats(),
            "server stopped"
        );

        result
    }
}
