//! # Errores del Servidor
//! src/error.rs
//!
//! Dos familias de errores:
//!
//! - [`ServeError`]: lo que un responder puede producir para una petición.
//!   Cada variante tiene un status code fijo y, salvo `Protocol`, se guarda
//!   en la cache igual que un éxito.
//! - [`ServerError`]: fallas fatales de arranque (bind, poll, configuración).

use crate::cache::ComputePanicked;
use crate::http::{Response, StatusCode};

/// Error de una petición, ya traducido desde el colaborador que falló
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServeError {
    /// Request line malformada o head demasiado grande (400, no se cachea)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Archivo inexistente o lookup sin filas (404)
    #[error("not found")]
    NotFound,

    /// Falla del filesystem o del datastore (500)
    #[error("upstream error: {0}")]
    Upstream(String),

    /// El responder no acepta el método (405)
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl ServeError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServeError::Protocol(_) => StatusCode::BadRequest,
            ServeError::NotFound => StatusCode::NotFound,
            ServeError::Upstream(_) => StatusCode::InternalServerError,
            ServeError::MethodNotAllowed => StatusCode::MethodNotAllowed,
        }
    }

    /// Respuesta genérica para el error, sin body
    ///
    /// Los responders que necesitan un body específico (ej: "User not found")
    /// construyen su propia respuesta.
    pub fn to_response(&self) -> Response {
        let response = Response::new(self.status());
        match self {
            ServeError::MethodNotAllowed => response.with_header("Allow", "GET"),
            _ => response,
        }
    }
}

impl From<ComputePanicked> for ServeError {
    fn from(err: ComputePanicked) -> Self {
        ServeError::Upstream(err.to_string())
    }
}

/// Fallas que abortan el arranque o el loop del reactor
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("readiness mechanism failed: {0}")]
    Poll(#[source] std::io::Error),

    #[error("failed to load datastore: {0}")]
    Datastore(#[from] crate::storage::DatastoreError),

    #[error("reactor thread panicked")]
    ReactorPanicked,
}
