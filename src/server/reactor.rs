//! # Reactor
//! src/server/reactor.rs
//!
//! Un solo thread multiplexa el socket de escucha y todas las conexiones
//! ociosas con `mio::Poll`. No lee ni escribe peticiones: cuando una conexión
//! tiene datos le quita el interés de lectura y la entrega al Dispatcher.
//!
//! ```text
//! poll ─┬─ LISTENER ──► accept hasta WouldBlock ──► register(READABLE)
//!       ├─ WAKER    ──► revisar flag de apagado
//!       └─ Token(n) ──► deregister ──► Dispatcher.submit(handler(conn))
//! ```
//!
//! Los sockets son `std::net` en modo no bloqueante registrados con
//! `SourceFd`, así el worker puede volverlos bloqueantes con timeouts.

use super::connection::{Connection, ConnectionHandler, ConnectionTracker};
use crate::error::ServerError;
use crate::metrics::ServerObserver;
use crate::workers::WorkerPool;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;

/// Eventos procesados por vuelta de `poll`
const EVENTS_CAPACITY: usize = 1024;

/// Permite detener el reactor desde otro thread
#[derive(Clone)]
pub struct ReactorHandle {
    shutdown: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ReactorHandle {
    /// Pide al reactor que termine después de la vuelta actual
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Err(e) = self.waker.wake() {
            tracing::warn!(error = %e, "failed to wake reactor");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    dispatcher: WorkerPool,
    handler: Arc<ConnectionHandler>,
    tracker: ConnectionTracker,
    observer: Arc<dyn ServerObserver>,
    shutdown: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl Reactor {
    pub fn new(
        listener: TcpListener,
        dispatcher: WorkerPool,
        handler: Arc<ConnectionHandler>,
        tracker: ConnectionTracker,
        observer: Arc<dyn ServerObserver>,
    ) -> Result<Self, ServerError> {
        listener.set_nonblocking(true).map_err(ServerError::Poll)?;

        let poll = Poll::new().map_err(ServerError::Poll)?;
        poll.registry()
            .register(&mut SourceFd(&listener.as_raw_fd()), LISTENER, Interest::READABLE)
            .map_err(ServerError::Poll)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER).map_err(ServerError::Poll)?);

        Ok(Self {
            poll,
            listener,
            connections: HashMap::new(),
            next_token: FIRST_CONNECTION,
            dispatcher,
            handler,
            tracker,
            observer,
            shutdown: Arc::new(AtomicBool::new(false)),
            waker,
        })
    }

    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle {
            shutdown: Arc::clone(&self.shutdown),
            waker: Arc::clone(&self.waker),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Conexiones registradas esperando datos
    pub fn idle_connections(&self) -> usize {
        self.connections.len()
    }

    /// Loop principal. Solo retorna al apagarse o si `poll` falla.
    pub fn run(&mut self) -> Result<(), ServerError> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        while !self.shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(ServerError::Poll(e));
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_connections(),
                    WAKER => {}
                    token if event.is_error() => self.close(token, "socket error"),
                    token => self.on_readable(token, event.is_read_closed()),
                }
            }

            self.observer.pool_status(&self.dispatcher.stats());
        }

        self.close_all();
        Ok(())
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.register(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.observer.accept_failed(&e);
                    break;
                }
            }
        }
    }

    fn register(&mut self, stream: TcpStream, peer: SocketAddr) {
        if stream.set_nonblocking(true).is_err() {
            self.observer.connection_dropped(peer, "failed to set non-blocking mode");
            return;
        }

        let token = Token(self.next_token);
        self.next_token += 1;

        if self
            .poll
            .registry()
            .register(&mut SourceFd(&stream.as_raw_fd()), token, Interest::READABLE)
            .is_err()
        {
            self.observer.connection_dropped(peer, "failed to register read interest");
            return;
        }

        self.tracker.register(token);
        self.connections.insert(token, Connection::new(stream, token, peer));
        self.observer.connection_accepted(peer);
    }

    fn on_readable(&mut self, token: Token, read_closed: bool) {
        // Ya despachada en esta misma vuelta: evento duplicado
        if !self.connections.contains_key(&token) {
            return;
        }

        if read_closed && self.closed_without_data(token) {
            self.close(token, "peer closed without sending data");
            return;
        }

        if let Err(e) = self.tracker.mark_awaiting_dispatch(token) {
            self.close(token, &e.to_string());
            return;
        }

        let Some(connection) = self.connections.remove(&token) else {
            return;
        };
        let peer = connection.peer();

        if self
            .poll
            .registry()
            .deregister(&mut SourceFd(&connection.stream().as_raw_fd()))
            .is_err()
        {
            self.tracker.discard(token);
            self.observer.connection_dropped(peer, "failed to remove read interest");
            return;
        }

        self.observer.connection_dispatched(peer);

        let handler = Arc::clone(&self.handler);
        if let Err(rejected) = self.dispatcher.submit(move || handler.handle(connection)) {
            // El job descartado se lleva la conexión: el socket se cierra sin respuesta
            drop(rejected);
            self.tracker.discard(token);
            self.observer.connection_rejected(peer);
        }
    }

    /// Hang-up sin bytes pendientes
    fn closed_without_data(&self, token: Token) -> bool {
        let mut probe = [0u8; 1];
        match self.connections.get(&token) {
            Some(connection) => matches!(connection.stream().peek(&mut probe), Ok(0)),
            None => false,
        }
    }

    fn close(&mut self, token: Token, reason: &str) {
        if let Some(connection) = self.connections.remove(&token) {
            let _ = self
                .poll
                .registry()
                .deregister(&mut SourceFd(&connection.stream().as_raw_fd()));
            self.tracker.discard(token);
            self.observer.connection_dropped(connection.peer(), reason);
        }
    }

    fn close_all(&mut self) {
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.close(token, "server shutting down");
        }
    }
}
