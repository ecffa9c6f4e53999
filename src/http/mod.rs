//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Subconjunto de HTTP/1.1 que necesita el servidor:
//!
//! - Parsing de la request line, query string y headers
//! - Construcción de responses (siempre `Connection: close`)
//! - Status codes usados: 200, 201, 400, 404, 405, 500
//!
//! No hay keep-alive, chunked transfer encoding ni HTTP/2.

pub mod request; // Parsing de HTTP requests
pub mod response; // Construcción de HTTP responses
pub mod status; // Códigos de estado HTTP

pub use request::{Method, ParseError, Request};
pub use response::Response;
pub use status::StatusCode;
