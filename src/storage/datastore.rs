//! # Datastore de Usuarios
//! src/storage/datastore.rs
//!
//! Colaborador del responder de lookups: ejecuta una única consulta
//! parametrizada (email por nombre) y distingue tres resultados:
//!
//! - `Ok(Some(email))`: hay fila
//! - `Ok(None)`: la consulta funcionó pero no hubo filas
//! - `Err(DatastoreError)`: falla de conexión o de consulta
//!
//! `JsonDatastore` guarda la tabla `users(name, email)` en un archivo JSON y
//! lo vuelve a leer en cada consulta, igual que abrir una conexión por query.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Errores del datastore
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatastoreError {
    /// La consulta no pudo ejecutarse
    #[error("query failed: {0}")]
    Query(String),

    /// El datastore no pudo abrirse al arrancar
    #[error("failed to load {path}: {reason}")]
    Load { path: String, reason: String },
}

/// Capacidad de consulta que necesita el responder
pub trait Datastore: Send + Sync {
    /// `SELECT email FROM users WHERE name = ?`
    fn lookup_email_by_name(&self, name: &str) -> Result<Option<String>, DatastoreError>;
}

/// Fila de la tabla de usuarios
#[derive(Debug, Clone, Deserialize)]
struct UserRow {
    name: String,
    email: String,
}

/// Formatos aceptados para el archivo:
/// `{"ana": "ana@example.com"}` o `[{"name": "ana", "email": "ana@example.com"}]`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UsersFile {
    Map(HashMap<String, String>),
    Rows(Vec<UserRow>),
}

impl UsersFile {
    fn into_map(self) -> HashMap<String, String> {
        match self {
            UsersFile::Map(map) => map,
            UsersFile::Rows(rows) => rows.into_iter().map(|row| (row.name, row.email)).collect(),
        }
    }
}

/// Datastore respaldado por un archivo JSON
#[derive(Debug, Clone)]
pub struct JsonDatastore {
    path: PathBuf,
}

impl JsonDatastore {
    /// Abre el datastore validando que el archivo exista y se pueda parsear
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DatastoreError> {
        let store = Self { path: path.into() };
        store.load().map_err(|e| DatastoreError::Load {
            path: store.path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, DatastoreError> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| DatastoreError::Query(format!("{}: {}", self.path.display(), e)))?;
        let users: UsersFile = serde_json::from_str(&raw)
            .map_err(|e| DatastoreError::Query(format!("{}: {}", self.path.display(), e)))?;
        Ok(users.into_map())
    }
}

impl Datastore for JsonDatastore {
    fn lookup_email_by_name(&self, name: &str) -> Result<Option<String>, DatastoreError> {
        let users = self.load()?;
        Ok(users.get(name).cloned())
    }
}

/// Datastore en memoria para embeber el servidor sin archivo
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    users: HashMap<String, String>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, name: &str, email: &str) -> Self {
        self.users.insert(name.to_string(), email.to_string());
        self
    }
}

impl Datastore for MemoryDatastore {
    fn lookup_email_by_name(&self, name: &str) -> Result<Option<String>, DatastoreError> {
        Ok(self.users.get(name).cloned())
    }
}
