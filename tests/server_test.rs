//! Tests de integración para el servidor HTTP
//! tests/server_test.rs
//!
//! Cada test levanta su propio servidor en un puerto efímero con un
//! directorio público y un archivo de usuarios temporales.

use reactor_http_server::config::Config;
use reactor_http_server::server::{RunningServer, Server, REACTOR_THREAD_NAME};
use reactor_http_server::storage::{
    Datastore, DatastoreError, DiskFileStore, FileStore, FileStoreError, MemoryDatastore,
};
use reactor_http_server::workers::BackpressurePolicy;
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const INDEX: &str = "<html><body>hola</body></html>";
const STYLE: &str = "body { color: red; }";

/// Response parseada de forma mínima
struct RawResponse {
    status_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn status(&self) -> u16 {
        self.status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0)
    }
}

fn parse_response(raw: &[u8]) -> RawResponse {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response without head terminator");
    let head = String::from_utf8_lossy(&raw[..split]).to_string();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default().to_string();
    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    RawResponse {
        status_line,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}

/// Helper: envía bytes crudos y retorna todo lo que el servidor respondió
fn send_raw(addr: SocketAddr, request: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    stream.write_all(request)?;
    stream.flush()?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response)?;
    Ok(response)
}

fn get(addr: SocketAddr, path: &str) -> RawResponse {
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
    let raw = send_raw(addr, request.as_bytes()).expect("request failed");
    parse_response(&raw)
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        port: 0,
        public_dir: dir.path().join("public").display().to_string(),
        users_file: dir.path().join("users.json").display().to_string(),
        min_workers: 2,
        max_workers: 8,
        io_timeout_ms: 5_000,
        ..Config::default()
    }
}

fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let public = dir.path().join("public");
    fs::create_dir_all(public.join("css")).unwrap();
    fs::write(public.join("index.html"), INDEX).unwrap();
    fs::write(public.join("css").join("site.css"), STYLE).unwrap();
    fs::write(
        dir.path().join("users.json"),
        r#"[{"name": "ana", "email": "ana@example.com"}, {"name": "luis", "email": "luis@example.com"}]"#,
    )
    .unwrap();
    dir
}

fn start(config: Config) -> RunningServer {
    Server::new(config).unwrap().start().unwrap()
}

// ==================== Static Files ====================

#[test]
fn test_root_serves_index() {
    let dir = fixture();
    let server = start(test_config(&dir));

    let response = get(server.local_addr(), "/");
    assert_eq!(response.status(), 200);
    assert_eq!(response.status_line, "HTTP/1.1 200 OK");
    assert_eq!(response.body, INDEX.as_bytes());
    assert_eq!(response.header("Content-Type"), Some("text/html"));
    assert_eq!(response.header("Content-Length"), Some(INDEX.len().to_string().as_str()));
    assert_eq!(response.header("Connection"), Some("close"));
    assert!(response.header("X-Worker-Thread").is_some());

    server.shutdown().unwrap();
}

#[test]
fn test_nested_file_and_content_type() {
    let dir = fixture();
    let server = start(test_config(&dir));

    let response = get(server.local_addr(), "/css/site.css");
    assert_eq!(response.status(), 200);
    assert_eq!(response.header("Content-Type"), Some("text/css"));
    assert_eq!(response.body, STYLE.as_bytes());

    server.shutdown().unwrap();
}

#[test]
fn test_missing_file_is_404_with_empty_body() {
    let dir = fixture();
    let server = start(test_config(&dir));

    let response = get(server.local_addr(), "/nope.html");
    assert_eq!(response.status(), 404);
    assert!(response.body.is_empty());

    server.shutdown().unwrap();
}

#[test]
fn test_repeated_requests_hit_file_cache() {
    let dir = fixture();
    let server = start(test_config(&dir));
    let addr = server.local_addr();

    for _ in 0..5 {
        assert_eq!(get(addr, "/index.html").status(), 200);
    }

    let stats = server.router().static_files().cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 4);

    server.shutdown().unwrap();
}

// ==================== Lookups ====================

#[test]
fn test_lookup_found_and_missing() {
    let dir = fixture();
    let server = start(test_config(&dir));
    let addr = server.local_addr();

    let found = get(addr, "/query?name=ana");
    assert_eq!(found.status(), 200);
    assert_eq!(found.body, b"Email: ana@example.com");

    let missing = get(addr, "/query?name=zoe");
    assert_eq!(missing.status(), 404);
    assert_eq!(missing.body, b"User not found");

    server.shutdown().unwrap();
}

#[test]
fn test_lookup_without_name_is_400() {
    let dir = fixture();
    let server = start(test_config(&dir));

    assert_eq!(get(server.local_addr(), "/query").status(), 400);

    server.shutdown().unwrap();
}

struct BrokenDatastore;

impl Datastore for BrokenDatastore {
    fn lookup_email_by_name(&self, _name: &str) -> Result<Option<String>, DatastoreError> {
        Err(DatastoreError::Query("connection refused".to_string()))
    }
}

#[test]
fn test_datastore_failure_is_500() {
    let dir = fixture();
    let config = test_config(&dir);
    let files = Arc::new(DiskFileStore::new(&config.public_dir));
    let server = Server::with_collaborators(config, files, Arc::new(BrokenDatastore))
        .unwrap()
        .start()
        .unwrap();

    let response = get(server.local_addr(), "/query?name=ana");
    assert_eq!(response.status(), 500);
    assert_eq!(response.body, b"Database error");

    // Los archivos siguen funcionando
    assert_eq!(get(server.local_addr(), "/").status(), 200);

    server.shutdown().unwrap();
}

// ==================== Protocol ====================

#[test]
fn test_method_token_only_is_400() {
    let dir = fixture();
    let server = start(test_config(&dir));

    let raw = send_raw(server.local_addr(), b"GET\r\n\r\n").unwrap();
    assert_eq!(parse_response(&raw).status(), 400);

    server.shutdown().unwrap();
}

#[test]
fn test_non_get_is_405() {
    let dir = fixture();
    let server = start(test_config(&dir));

    let raw = send_raw(server.local_addr(), b"POST /index.html HTTP/1.1\r\n\r\n").unwrap();
    let response = parse_response(&raw);
    assert_eq!(response.status(), 405);
    assert_eq!(response.header("Allow"), Some("GET"));

    server.shutdown().unwrap();
}

#[test]
fn test_silent_client_does_not_break_server() {
    let dir = fixture();
    let server = start(test_config(&dir));
    let addr = server.local_addr();

    drop(TcpStream::connect(addr).unwrap());

    assert_eq!(get(addr, "/").status(), 200);

    server.shutdown().unwrap();
}

// ==================== Backpressure ====================

/// FileStore que tarda en responder y cuenta lecturas
struct SlowStore {
    delay: Duration,
    reads: AtomicUsize,
}

impl FileStore for SlowStore {
    fn read(&self, path: &str) -> Result<Vec<u8>, FileStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        Ok(path.as_bytes().to_vec())
    }
}

fn slow_server(dir: &TempDir, policy: BackpressurePolicy, max_workers: usize) -> RunningServer {
    let config = Config {
        min_workers: 1,
        max_workers,
        backpressure: policy,
        file_workers: 8,
        ..test_config(dir)
    };
    let store = Arc::new(SlowStore {
        delay: Duration::from_millis(300),
        reads: AtomicUsize::new(0),
    });

    Server::with_collaborators(config, store, Arc::new(MemoryDatastore::new()))
        .unwrap()
        .start()
        .unwrap()
}

/// Abre todas las conexiones y envía todo antes de leer
fn burst(addr: SocketAddr, paths: &[String]) -> Vec<std::io::Result<Vec<u8>>> {
    let mut streams = Vec::new();
    for path in paths {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\n\r\n", path).as_bytes())
            .unwrap();
        streams.push(stream);
    }

    streams
        .into_iter()
        .map(|mut stream| {
            let mut response = Vec::new();
            stream.read_to_end(&mut response).map(|_| response)
        })
        .collect()
}

#[test]
fn test_caller_runs_serves_every_request() {
    let dir = fixture();
    let max_workers = 2;
    let server = slow_server(&dir, BackpressurePolicy::CallerRuns, max_workers);

    let paths: Vec<String> = (0..2 * max_workers).map(|i| format!("/file-{}.txt", i)).collect();
    let responses: Vec<RawResponse> = burst(server.local_addr(), &paths)
        .into_iter()
        .map(|result| parse_response(&result.unwrap()))
        .collect();

    assert!(responses.iter().all(|r| r.status() == 200));
    assert!(responses
        .iter()
        .any(|r| r.header("X-Worker-Thread") == Some(REACTOR_THREAD_NAME)));

    server.shutdown().unwrap();
}

#[test]
fn test_reject_closes_without_response() {
    let dir = fixture();
    let server = slow_server(&dir, BackpressurePolicy::Reject, 1);

    let paths: Vec<String> = (0..3).map(|i| format!("/file-{}.txt", i)).collect();
    let results = burst(server.local_addr(), &paths);

    let served = results
        .iter()
        .filter(|r| matches!(r, Ok(bytes) if !bytes.is_empty()))
        .count();
    let rejected = results.len() - served;

    assert!(served >= 1);
    assert!(rejected >= 1);

    server.shutdown().unwrap();
}

#[test]
fn test_concurrent_same_file_reads_once() {
    let dir = fixture();
    let config = Config {
        min_workers: 8,
        max_workers: 8,
        ..test_config(&dir)
    };
    let store = Arc::new(SlowStore {
        delay: Duration::from_millis(200),
        reads: AtomicUsize::new(0),
    });
    let server = Server::with_collaborators(config, store.clone(), Arc::new(MemoryDatastore::new()))
        .unwrap()
        .start()
        .unwrap();

    let paths: Vec<String> = (0..6).map(|_| "/same.txt".to_string()).collect();
    for result in burst(server.local_addr(), &paths) {
        assert_eq!(parse_response(&result.unwrap()).body, b"/same.txt");
    }

    assert_eq!(store.reads.load(Ordering::SeqCst), 1);

    server.shutdown().unwrap();
}

// ==================== Lifecycle ====================

#[test]
fn test_shutdown_via_handle() {
    let dir = fixture();
    let server = start(test_config(&dir));
    let addr = server.local_addr();
    let handle = server.handle();

    let waiter = thread::spawn(move || server.wait());
    assert_eq!(get(addr, "/").status(), 200);

    handle.shutdown();
    assert!(waiter.join().unwrap().is_ok());
}

#[test]
fn test_bind_failure_is_reported() {
    let dir = fixture();
    let first = start(test_config(&dir));

    let config = Config {
        port: first.local_addr().port(),
        ..test_config(&dir)
    };
    let err = Server::new(config).unwrap().start().err().unwrap();
    assert!(err.to_string().contains("failed to bind"));

    first.shutdown().unwrap();
}

#[test]
fn test_missing_users_file_fails_startup() {
    let dir = fixture();
    let config = Config {
        users_file: dir.path().join("absent.json").display().to_string(),
        ..test_config(&dir)
    };

    assert!(Server::new(config).is_err());
}
