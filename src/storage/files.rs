//! # Almacén de Archivos Estáticos
//! src/storage/files.rs
//!
//! Colaborador del responder de archivos: `read(path) → bytes | NotFound | Io`.
//! Los paths se resuelven dentro de un directorio raíz; cualquier intento de
//! salir de él (`..`, paths absolutos) se trata como inexistente.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Errores al leer un archivo
#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Fuente de bytes para el responder de archivos estáticos
pub trait FileStore: Send + Sync {
    /// Lee el archivo completo. `path` es el path de la URL (ej: "/css/site.css").
    fn read(&self, path: &str) -> Result<Vec<u8>, FileStoreError>;
}

/// Archivos servidos desde un directorio del disco
#[derive(Debug, Clone)]
pub struct DiskFileStore {
    root: PathBuf,
}

impl DiskFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Traduce el path de la URL a un path dentro de `root`, o `None` si se escapa
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();

        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }

        Some(resolved)
    }
}

impl FileStore for DiskFileStore {
    fn read(&self, path: &str) -> Result<Vec<u8>, FileStoreError> {
        let full_path = self
            .resolve(path)
            .ok_or_else(|| FileStoreError::NotFound(path.to_string()))?;

        match fs::metadata(&full_path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(FileStoreError::NotFound(path.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FileStoreError::NotFound(path.to_string()))
            }
            Err(source) => {
                return Err(FileStoreError::Io {
                    path: path.to_string(),
                    source,
                })
            }
        }

        fs::read(&full_path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => FileStoreError::NotFound(path.to_string()),
            _ => FileStoreError::Io {
                path: path.to_string(),
                source,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let contents = vec![0u8, 1, 2, 255, b'\n'];
        fs::write(dir.path().join("blob.bin"), &contents).unwrap();

        let store = DiskFileStore::new(dir.path());
        assert_eq!(store.read("/blob.bin").unwrap(), contents);
    }

    #[test]
    fn test_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "body{}").unwrap();

        let store = DiskFileStore::new(dir.path());
        assert_eq!(store.read("/css/site.css").unwrap(), b"body{}");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskFileStore::new(dir.path());

        assert!(matches!(store.read("/nope.html"), Err(FileStoreError::NotFound(_))));
    }

    #[test]
    fn test_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let store = DiskFileStore::new(dir.path());

        assert!(matches!(store.read("/sub"), Err(FileStoreError::NotFound(_))));
    }

    #[test]
    fn test_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        fs::create_dir(&public).unwrap();
        fs::write(dir.path().join("secret.txt"), "secret").unwrap();

        let store = DiskFileStore::new(&public);
        assert!(matches!(store.read("/../secret.txt"), Err(FileStoreError::NotFound(_))));
        assert!(matches!(store.read("/a/../../secret.txt"), Err(FileStoreError::NotFound(_))));
    }
}
