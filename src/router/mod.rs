//! # Router
//! src/router/mod.rs
//!
//! Despacho puro según el path parseado:
//!
//! ```text
//! GET /query?name=ana ──► DatastoreResponder("ana")
//! GET /               ──► StaticFileResponder("/index.html")
//! GET /css/site.css   ──► StaticFileResponder("/css/site.css")
//! ```
//!
//! No hay tabla de rutas general: solo el path de lookup y "todo lo demás".

use crate::error::ServeError;
use crate::http::{Request, Response};
use crate::responders::{DatastoreResponder, StaticFileResponder};

/// Valor del header `Server`
const SERVER_NAME: &str = "reactor-http-server";

/// Parámetros del ruteo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Path que se despacha al datastore (ej: "/query")
    pub lookup_path: String,

    /// Query parameter con la key del lookup (ej: "name")
    pub lookup_param: String,

    /// Documento que se sirve para "/" (ej: "index.html")
    pub index_document: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            lookup_path: "/query".to_string(),
            lookup_param: "name".to_string(),
            index_document: "index.html".to_string(),
        }
    }
}

/// Router entre los dos responders
pub struct Router {
    config: RouterConfig,
    static_files: StaticFileResponder,
    datastore: DatastoreResponder,
}

impl Router {
    pub fn new(
        config: RouterConfig,
        static_files: StaticFileResponder,
        datastore: DatastoreResponder,
    ) -> Self {
        Self {
            config,
            static_files,
            datastore,
        }
    }

    /// Elige el responder y ejecuta la petición
    pub fn route(&self, request: &Request) -> Response {
        let method = request.method();
        let path = request.path();

        let mut response = if path == self.config.lookup_path {
            if !self.datastore.allows(method) {
                ServeError::MethodNotAllowed.to_response()
            } else {
                match request
                    .query_param(&self.config.lookup_param)
                    .filter(|name| !name.is_empty())
                {
                    Some(name) => self.datastore.respond(method, name),
                    None => ServeError::Protocol(format!(
                        "missing query parameter `{}`",
                        self.config.lookup_param
                    ))
                    .to_response(),
                }
            }
        } else if path == "/" {
            let index = format!("/{}", self.config.index_document);
            self.static_files.respond(method, &index)
        } else {
            self.static_files.respond(method, path)
        };

        self.add_common_headers(&mut response);
        response
    }

    /// Agrega headers comunes a todas las respuestas
    fn add_common_headers(&self, response: &mut Response) {
        response.add_header("Server", SERVER_NAME);
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn static_files(&self) -> &StaticFileResponder {
        &self.static_files
    }

    pub fn datastore(&self) -> &DatastoreResponder {
        &self.datastore
    }
}
