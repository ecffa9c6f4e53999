//! # Responders
//! src/responders/mod.rs
//!
//! Cada responder traduce una petición ya ruteada en un cómputo cacheado y
//! renderiza el resultado (valor o error) como respuesta HTTP. Ningún error
//! de los colaboradores sale de aquí sin convertirse antes en [`ServeError`].
//!
//! [`ServeError`]: crate::error::ServeError

pub mod datastore;
pub mod static_files;

pub use datastore::{DatastoreResponder, LookupCache};
pub use static_files::{FileCache, StaticFileResponder};
