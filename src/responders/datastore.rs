//! # Responder de Lookups en el Datastore
//! src/responders/datastore.rs
//!
//! key = nombre buscado, cómputo = consulta sincrónica en el pool `datastore`.
//! "Sin filas" y "falla de consulta" son resultados distintos y ambos se cachean:
//!
//! | Resultado | Respuesta |
//! |---|---|
//! | fila | 200 `Email: <email>` |
//! | sin filas | 404 `User not found` |
//! | error | 500 `Database error` |

use crate::cache::BoundedAsyncCache;
use crate::error::ServeError;
use crate::http::{Method, Response, StatusCode};
use crate::storage::Datastore;
use std::sync::Arc;

/// Cache de lookups: nombre → email
pub type LookupCache = BoundedAsyncCache<String, String, ServeError>;

pub struct DatastoreResponder {
    datastore: Arc<dyn Datastore>,
    cache: LookupCache,
}

impl DatastoreResponder {
    pub fn new(datastore: Arc<dyn Datastore>, cache: LookupCache) -> Self {
        Self { datastore, cache }
    }

    /// Solo GET
    pub fn allows(&self, method: Method) -> bool {
        method == Method::GET
    }

    pub fn respond(&self, method: Method, name: &str) -> Response {
        if !self.allows(method) {
            return ServeError::MethodNotAllowed.to_response();
        }

        match self.lookup(name) {
            Ok(email) => Response::text(StatusCode::Ok, &format!("Email: {}", email)),
            Err(ServeError::NotFound) => Response::text(StatusCode::NotFound, "User not found"),
            Err(ServeError::Upstream(reason)) => {
                tracing::warn!(name, %reason, "datastore lookup failed");
                Response::text(StatusCode::InternalServerError, "Database error")
            }
            Err(other) => other.to_response(),
        }
    }

    /// Email del usuario, pasando por la cache
    pub fn lookup(&self, name: &str) -> Result<String, ServeError> {
        let datastore = Arc::clone(&self.datastore);
        let query_name = name.to_string();

        self.cache
            .get_or_compute(name.to_string(), move || {
                match datastore.lookup_email_by_name(&query_name) {
                    Ok(Some(email)) => Ok(email),
                    Ok(None) => Err(ServeError::NotFound),
                    Err(e) => Err(ServeError::Upstream(e.to_string())),
                }
            })
            .wait()
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatastoreError;
    use crate::workers::{PoolConfig, WorkerPool};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Datastore que falla para un nombre específico
    struct FlakyDatastore {
        users: HashMap<String, String>,
        failing_name: String,
        queries: AtomicUsize,
    }

    impl Datastore for FlakyDatastore {
        fn lookup_email_by_name(&self, name: &str) -> Result<Option<String>, DatastoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if name == self.failing_name {
                return Err(DatastoreError::Query("connection refused".to_string()));
            }
            Ok(self.users.get(name).cloned())
        }
    }

    fn responder() -> (DatastoreResponder, Arc<FlakyDatastore>) {
        let datastore = Arc::new(FlakyDatastore {
            users: HashMap::from([("ana".to_string(), "ana@example.com".to_string())]),
            failing_name: "mallory".to_string(),
            queries: AtomicUsize::new(0),
        });
        let pool = WorkerPool::new(PoolConfig::fixed("datastore-test", 2));
        let cache = LookupCache::new("lookups", 8, pool);
        (DatastoreResponder::new(datastore.clone(), cache), datastore)
    }

    #[test]
    fn test_known_name() {
        let (responder, _) = responder();
        let response = responder.respond(Method::GET, "ana");

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body(), b"Email: ana@example.com");
    }

    #[test]
    fn test_unknown_name_is_404() {
        let (responder, _) = responder();
        let response = responder.respond(Method::GET, "zoe");

        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.body(), b"User not found");
    }

    #[test]
    fn test_failure_is_500_and_does_not_poison_other_keys() {
        let (responder, _) = responder();

        let failed = responder.respond(Method::GET, "mallory");
        assert_eq!(failed.status(), StatusCode::InternalServerError);
        assert_eq!(failed.body(), b"Database error");

        assert_eq!(responder.respond(Method::GET, "ana").status(), StatusCode::Ok);
    }

    #[test]
    fn test_not_found_and_failure_are_cached() {
        let (responder, datastore) = responder();

        for _ in 0..3 {
            responder.respond(Method::GET, "zoe");
            responder.respond(Method::GET, "mallory");
        }

        assert_eq!(datastore.queries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delete_is_method_not_allowed() {
        let (responder, datastore) = responder();
        let response = responder.respond(Method::DELETE, "ana");

        assert_eq!(response.status(), StatusCode::MethodNotAllowed);
        assert_eq!(datastore.queries.load(Ordering::SeqCst), 0);
    }
}
