//! # Parsing de Requests HTTP
//! src/http/request.rs
//!
//! Lexer mínimo para el subconjunto de HTTP/1.1 que atiende el servidor.
//!
//! ## Formato de un Request
//!
//! ```text
//! GET /query?name=ana HTTP/1.1\r\n
//! Host: localhost:8080\r\n
//! \r\n
//! (body opcional)
//! ```
//!
//! Los headers solo se usan para ubicar la línea vacía que separa el body.

use std::collections::HashMap;

/// Separador entre el head y el body
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Métodos HTTP que distingue el router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    /// Cualquier otro token (HEAD, PATCH, OPTIONS...)
    OTHER,
}

impl Method {
    /// Parsea el token del método. Los métodos desconocidos no son error:
    /// el responder decide si los acepta (405) o no.
    fn from_token(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            _ => Method::OTHER,
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::OTHER => "OTHER",
        }
    }
}

/// Representa un request HTTP parseado. Inmutable después de `parse`.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,

    /// Path sin query string (ej: "/index.html")
    path: String,

    /// Query parameters, `None` si el target no tenía `?`
    query: Option<HashMap<String, String>>,

    headers: HashMap<String, String>,

    /// Versión HTTP ("HTTP/1.0" o "HTTP/1.1"; vacía si el cliente la omitió)
    version: String,

    body: Vec<u8>,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Empty request")]
    EmptyRequest,

    #[error("Invalid request line format")]
    InvalidRequestLine,

    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Request is not valid UTF-8")]
    InvalidEncoding,
}

/// Retorna la posición donde termina el head (después de `\r\n\r\n`), si ya llegó completo
///
/// # Ejemplo
/// ```
/// use reactor_http_server::http::request::head_end;
///
/// assert_eq!(head_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(18));
/// assert_eq!(head_end(b"GET / HTTP/1.1\r\n"), None);
/// ```
pub fn head_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .map(|pos| pos + HEAD_TERMINATOR.len())
}

impl Request {
    /// Parsea un request desde bytes
    ///
    /// El buffer puede no traer la línea vacía final (cliente que cerró su
    /// lado de escritura); en ese caso todo se interpreta como head.
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use reactor_http_server::http::{Method, Request};
    ///
    /// let raw = b"GET /query?name=ana HTTP/1.1\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.method(), Method::GET);
    /// assert_eq!(request.path(), "/query");
    /// assert_eq!(request.query_param("name"), Some("ana"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let (head_bytes, body) = match head_end(buffer) {
            Some(end) => (&buffer[..end - HEAD_TERMINATOR.len()], buffer[end..].to_vec()),
            None => (buffer, Vec::new()),
        };

        let head = std::str::from_utf8(head_bytes).map_err(|_| ParseError::InvalidEncoding)?;

        if head.trim().is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        let mut lines = head.split("\r\n");
        let request_line = lines.next().ok_or(ParseError::EmptyRequest)?;
        let (method, path, query, version) = Self::parse_request_line(request_line)?;
        let headers = Self::parse_headers(lines)?;

        Ok(Request {
            method,
            path,
            query,
            headers,
            version,
            body,
        })
    }

    /// Formato: `METHOD /path?query [HTTP/1.x]`
    fn parse_request_line(
        line: &str,
    ) -> Result<(Method, String, Option<HashMap<String, String>>, String), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        // Método y path son obligatorios; la versión puede faltar (HTTP/0.9 style)
        if parts.len() < 2 || parts.len() > 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = Method::from_token(parts[0]);

        if !parts[1].starts_with('/') {
            return Err(ParseError::InvalidRequestLine);
        }
        let (path, query) = Self::parse_path_and_query(parts[1]);

        let version = parts.get(2).map(|v| v.to_string()).unwrap_or_default();
        if !version.is_empty() && version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version));
        }

        Ok((method, path, query, version))
    }

    /// Ejemplo: "/query?name=ana" → ("/query", Some({"name": "ana"}))
    fn parse_path_and_query(target: &str) -> (String, Option<HashMap<String, String>>) {
        match target.split_once('?') {
            Some((path, query_string)) => {
                (path.to_string(), Some(Self::parse_query_string(query_string)))
            }
            None => (target.to_string(), None),
        }
    }

    fn parse_query_string(query: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();

        for param in query.split('&').filter(|p| !p.is_empty()) {
            match param.split_once('=') {
                Some((key, value)) => {
                    params.insert(url_decode(key), url_decode(value));
                }
                // Parámetro sin valor (ej: "?debug")
                None => {
                    params.insert(url_decode(param), String::new());
                }
            }
        }

        params
    }

    /// Cada header tiene formato: "Name: Value"
    fn parse_headers<'a>(
        lines: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, String>, ParseError> {
        let mut headers = HashMap::new();

        for line in lines {
            if line.trim().is_empty() {
                break;
            }

            match line.split_once(':') {
                Some((name, value)) => {
                    headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                }
                None => return Err(ParseError::InvalidHeader(line.to_string())),
            }
        }

        Ok(headers)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters, si el target traía `?`
    pub fn query(&self) -> Option<&HashMap<String, String>> {
        self.query.as_ref()
    }

    /// Obtiene un query parameter específico
    ///
    /// # Ejemplo
    /// ```
    /// use reactor_http_server::http::Request;
    ///
    /// let request = Request::parse(b"GET /query?name=ana%20maria HTTP/1.1\r\n\r\n").unwrap();
    ///
    /// assert_eq!(request.query_param("name"), Some("ana maria"));
    /// assert_eq!(request.query_param("missing"), None);
    /// ```
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.as_ref()?.get(name).map(|s| s.as_str())
    }

    /// Obtiene un header (el nombre no distingue mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Decodifica `%XX` y `+` de un componente de query string.
/// Las secuencias inválidas se dejan tal cual.
fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(high), Some(low)) => {
                        out.push(high << 4 | low);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let request = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.path(), "/");
        assert!(request.query().is_none());
        assert_eq!(request.version(), "HTTP/1.1");
    }

    #[test]
    fn test_parse_with_query_params() {
        let request = Request::parse(b"GET /query?name=ana&x=1 HTTP/1.0\r\n\r\n").unwrap();

        assert_eq!(request.path(), "/query");
        assert_eq!(request.query_param("name"), Some("ana"));
        assert_eq!(request.query_param("x"), Some("1"));
    }

    #[test]
    fn test_flag_param_without_value() {
        let request = Request::parse(b"GET /query?debug HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.query_param("debug"), Some(""));
    }

    #[test]
    fn test_parse_with_headers_case_insensitive() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost:8080\r\nUser-Agent: test\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.header("host"), Some("localhost:8080"));
        assert_eq!(request.header("USER-AGENT"), Some("test"));
    }

    #[test]
    fn test_body_after_blank_line() {
        let raw = b"POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.body(), b"hello");
    }

    #[test]
    fn test_unknown_method_is_other() {
        let request = Request::parse(b"PATCH /x HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.method(), Method::OTHER);

        let request = Request::parse(b"DELETE /x HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.method(), Method::DELETE);
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("a+b"), "a b");
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
        assert_eq!(url_decode("%C3%B1"), "ñ");
    }

    #[test]
    fn test_missing_version_is_accepted() {
        let request = Request::parse(b"GET /index.html\r\n\r\n").unwrap();
        assert_eq!(request.path(), "/index.html");
        assert_eq!(request.version(), "");
    }

    #[test]
    fn test_invalid_version() {
        let result = Request::parse(b"GET / HTTP/2.0\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHttpVersion(_))));
    }

    #[test]
    fn test_empty_request() {
        assert_eq!(Request::parse(b"").unwrap_err(), ParseError::EmptyRequest);
        assert_eq!(Request::parse(b"\r\n\r\n").unwrap_err(), ParseError::EmptyRequest);
    }

    #[test]
    fn test_method_token_only() {
        let result = Request::parse(b"GET\r\n\r\n");
        assert_eq!(result.unwrap_err(), ParseError::InvalidRequestLine);
    }

    #[test]
    fn test_invalid_header() {
        let result = Request::parse(b"GET / HTTP/1.1\r\nno-colon-here\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
    }

    #[test]
    fn test_head_end() {
        assert_eq!(head_end(b"\r\n\r\n"), Some(4));
        assert_eq!(head_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
    }
}
