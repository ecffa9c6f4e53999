//! # Conexiones y su Máquina de Estados
//! src/server/connection.rs
//!
//! ```text
//!   accept ──► Idle ──(readable, reactor)──► AwaitingDispatch ──(worker)──► InFlight ──► discard
//! ```
//!
//! El reactor quita el interés de lectura y marca `AwaitingDispatch` como una
//! sola transición; el worker la completa con `begin`. Una conexión nunca puede
//! estar `InFlight` en dos workers: el segundo `begin` falla.

use crate::http::request::head_end;
use crate::http::{Request, Response, StatusCode};
use crate::metrics::{RequestRecord, ServerObserver};
use crate::router::Router;
use mio::Token;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Estado de una conexión registrada
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Registrada en el reactor, esperando datos
    Idle,
    /// Sin interés de lectura, entregada (o por entregarse) al Dispatcher
    AwaitingDispatch,
    /// Un worker la está atendiendo
    InFlight,
}

/// Transición inválida de la máquina de estados
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("connection {token:?}: expected {expected:?}, found {found:?}")]
pub struct TransitionError {
    pub token: Token,
    pub expected: ConnState,
    pub found: Option<ConnState>,
}

/// Estados de todas las conexiones vivas, compartido entre reactor y workers
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    states: Arc<Mutex<HashMap<Token, ConnState>>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conexión recién aceptada
    pub fn register(&self, token: Token) {
        self.states.lock().insert(token, ConnState::Idle);
    }

    /// Reactor: `Idle → AwaitingDispatch`
    pub fn mark_awaiting_dispatch(&self, token: Token) -> Result<(), TransitionError> {
        self.transition(token, ConnState::Idle, ConnState::AwaitingDispatch)
    }

    /// Worker: `AwaitingDispatch → InFlight`
    pub fn begin(&self, token: Token) -> Result<(), TransitionError> {
        self.transition(token, ConnState::AwaitingDispatch, ConnState::InFlight)
    }

    /// Conexión cerrada; su registro desaparece
    pub fn discard(&self, token: Token) -> Option<ConnState> {
        self.states.lock().remove(&token)
    }

    pub fn state(&self, token: Token) -> Option<ConnState> {
        self.states.lock().get(&token).copied()
    }

    /// Conexiones que algún worker está atendiendo
    pub fn in_flight(&self) -> usize {
        self.states
            .lock()
            .values()
            .filter(|state| **state == ConnState::InFlight)
            .count()
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn transition(&self, token: Token, from: ConnState, to: ConnState) -> Result<(), TransitionError> {
        let mut states = self.states.lock();
        match states.get_mut(&token) {
            Some(state) if *state == from => {
                *state = to;
                Ok(())
            }
            other => Err(TransitionError {
                token,
                expected: from,
                found: other.map(|state| *state),
            }),
        }
    }
}

/// Socket aceptado más su token de registro
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    token: Token,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, token: Token, peer: SocketAddr) -> Self {
        Self {
            stream,
            token,
            peer,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

/// Resultado de leer el head de la petición
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum HeadRead {
    /// El peer cerró sin enviar nada
    Closed,
    /// Head completo (o todo lo que llegó antes de EOF)
    Complete(Vec<u8>),
    /// El buffer se llenó sin encontrar el fin del head
    TooLarge,
}

/// Lee hasta `\r\n\r\n`, EOF o `max_bytes`
pub(crate) fn read_head(stream: &mut impl Read, max_bytes: usize) -> io::Result<HeadRead> {
    let mut buffer = vec![0u8; max_bytes];
    let mut filled = 0;

    loop {
        if filled == max_bytes {
            return Ok(HeadRead::TooLarge);
        }

        let n = match stream.read(&mut buffer[filled..]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if n == 0 {
            if filled == 0 {
                return Ok(HeadRead::Closed);
            }
            buffer.truncate(filled);
            return Ok(HeadRead::Complete(buffer));
        }

        filled += n;

        if head_end(&buffer[..filled]).is_some() {
            buffer.truncate(filled);
            return Ok(HeadRead::Complete(buffer));
        }
    }
}

/// Parámetros de IO de los workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Tamaño del buffer fijo para el head
    pub max_head_bytes: usize,
    /// Timeout de lectura/escritura del socket
    pub io_timeout: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: 8192,
            io_timeout: Duration::from_secs(30),
        }
    }
}

/// Lo que ejecuta cada WorkItem: un ciclo request/response sobre una conexión
pub struct ConnectionHandler {
    router: Arc<Router>,
    tracker: ConnectionTracker,
    observer: Arc<dyn ServerObserver>,
    config: HandlerConfig,
}

impl ConnectionHandler {
    pub fn new(
        router: Arc<Router>,
        tracker: ConnectionTracker,
        observer: Arc<dyn ServerObserver>,
        config: HandlerConfig,
    ) -> Self {
        Self {
            router,
            tracker,
            observer,
            config,
        }
    }

    /// Atiende la conexión y la cierra. Nunca hace panic por errores de IO.
    pub fn handle(&self, connection: Connection) {
        let token = connection.token();
        let peer = connection.peer();

        if let Err(e) = self.tracker.begin(token) {
            tracing::error!(%peer, error = %e, "refusing duplicate dispatch");
            return;
        }

        match self.serve(connection) {
            Ok(Some(record)) => self.observer.request_completed(&record),
            Ok(None) => self.observer.connection_failed(
                peer,
                &io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed before sending a request"),
            ),
            Err(e) => self.observer.connection_failed(peer, &e),
        }

        self.tracker.discard(token);
    }

    fn serve(&self, connection: Connection) -> io::Result<Option<RequestRecord>> {
        let start = Instant::now();
        let peer = connection.peer();
        let mut stream = connection.stream;

        // El reactor lo dejó no bloqueante; el worker lee y escribe bloqueando
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.config.io_timeout))?;
        stream.set_write_timeout(Some(self.config.io_timeout))?;

        let (mut response, method, path) = match read_head(&mut stream, self.config.max_head_bytes)? {
            HeadRead::Closed => return Ok(None),
            HeadRead::TooLarge => (
                Response::text(StatusCode::BadRequest, "Request head too large"),
                String::from("-"),
                String::from("-"),
            ),
            HeadRead::Complete(raw) => match Request::parse(&raw) {
                Ok(request) => (
                    self.router.route(&request),
                    request.method().as_str().to_string(),
                    request.path().to_string(),
                ),
                Err(e) => (
                    Response::text(StatusCode::BadRequest, &format!("Invalid: {}", e)),
                    String::from("-"),
                    String::from("-"),
                ),
            },
        };

        let worker = thread::current().name().unwrap_or("unnamed").to_string();
        response.add_header("X-Worker-Thread", &worker);

        stream.write_all(&response.to_bytes())?;
        stream.flush()?;

        // El peer pudo haber cerrado ya; no es un error para nosotros
        let _ = stream.shutdown(Shutdown::Both);

        Ok(Some(RequestRecord {
            peer,
            method,
            path,
            status: response.status().as_u16(),
            latency: start.elapsed(),
            worker,
        }))
    }
}
