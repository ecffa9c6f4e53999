//! # Colaboradores de Almacenamiento
//! src/storage/mod.rs
//!
//! - `files`: lectura de archivos estáticos desde disco
//! - `datastore`: consulta de emails por nombre de usuario

pub mod datastore;
pub mod files;

pub use datastore::{Datastore, DatastoreError, JsonDatastore, MemoryDatastore};
pub use files::{DiskFileStore, FileStore, FileStoreError};
