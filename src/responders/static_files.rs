//! # Responder de Archivos Estáticos
//! src/responders/static_files.rs
//!
//! Adaptador delgado sobre la cache: key = path normalizado, cómputo =
//! lectura sincrónica del archivo en el pool `files`.
//!
//! | Resultado de la lectura | Respuesta |
//! |---|---|
//! | bytes | 200, body exacto, Content-Type por extensión |
//! | NotFound | 404, body vacío |
//! | Io | 500, body vacío |

use crate::cache::BoundedAsyncCache;
use crate::error::ServeError;
use crate::http::{Method, Response, StatusCode};
use crate::storage::{FileStore, FileStoreError};
use std::sync::Arc;

/// Cache de archivos: path normalizado → bytes del archivo
pub type FileCache = BoundedAsyncCache<String, Arc<Vec<u8>>, ServeError>;

/// Content-Type según la extensión del archivo
///
/// # Ejemplo
/// ```
/// use reactor_http_server::responders::static_files::content_type_for;
///
/// assert_eq!(content_type_for("/index.html"), "text/html");
/// assert_eq!(content_type_for("/logo.JPG"), "image/jpeg");
/// assert_eq!(content_type_for("/README"), "text/plain");
/// ```
pub fn content_type_for(path: &str) -> &'static str {
    let extension = path
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "text/plain",
    }
}

/// Normaliza el path de la URL: un solo `/` entre segmentos, sin `.`.
/// Devuelve `None` si el path intenta subir de directorio.
///
/// # Ejemplo
/// ```
/// use reactor_http_server::responders::static_files::normalize_path;
///
/// assert_eq!(normalize_path("//css/./site.css").as_deref(), Some("/css/site.css"));
/// assert_eq!(normalize_path("/../etc/passwd"), None);
/// ```
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            other => segments.push(other),
        }
    }

    Some(format!("/{}", segments.join("/")))
}

/// Responde archivos estáticos a través de su propia cache
pub struct StaticFileResponder {
    store: Arc<dyn FileStore>,
    cache: FileCache,
}

impl StaticFileResponder {
    pub fn new(store: Arc<dyn FileStore>, cache: FileCache) -> Self {
        Self { store, cache }
    }

    /// Solo GET
    pub fn allows(&self, method: Method) -> bool {
        method == Method::GET
    }

    pub fn respond(&self, method: Method, path: &str) -> Response {
        if !self.allows(method) {
            return ServeError::MethodNotAllowed.to_response();
        }

        match self.lookup(path) {
            Ok((key, bytes)) => Response::new(StatusCode::Ok)
                .with_content_type(content_type_for(&key))
                .with_body_bytes(bytes.as_ref().clone()),
            Err(e) => {
                if let ServeError::Upstream(reason) = &e {
                    tracing::warn!(path, %reason, "static file read failed");
                }
                e.to_response()
            }
        }
    }

    /// Busca el archivo en la cache (o lo lee), devolviendo la key normalizada
    pub fn lookup(&self, path: &str) -> Result<(String, Arc<Vec<u8>>), ServeError> {
        let key = normalize_path(path).ok_or(ServeError::NotFound)?;

        let store = Arc::clone(&self.store);
        let read_key = key.clone();
        let handle = self.cache.get_or_compute(key.clone(), move || {
            store
                .read(&read_key)
                .map(Arc::new)
                .map_err(|e| match e {
                    FileStoreError::NotFound(_) => ServeError::NotFound,
                    FileStoreError::Io { .. } => ServeError::Upstream(e.to_string()),
                })
        });

        handle.wait().map(|bytes| (key, bytes))
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }
}
