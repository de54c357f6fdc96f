use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::http::headers::HeaderMap;

/// HTTP request methods accepted by the proxy.
///
/// `CONNECT` tunnelling is not supported; such requests fail to parse and the
/// client receives `400 Bad Request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// TRACE - Message loop-back test
    TRACE,
}

/// A parsed HTTP request received from a client.
///
/// This is the read-only view the proxy pipeline works on. Nothing in the
/// pipeline mutates it; the relay builds a separate outbound request from it.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target exactly as sent: origin-form (`/a?b`) or
    /// absolute-form (`http://host/a?b`).
    pub target: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers, case-insensitive and multi-valued
    pub headers: HeaderMap,
    /// Request body, de-chunked if it arrived chunked
    pub body: Bytes,
    /// Address of the directly connected peer, if known
    pub peer: Option<SocketAddr>,
    /// Whether the request arrived over an encrypted transport
    pub secure: bool,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<Method>,
    target: Option<String>,
    version: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    peer: Option<SocketAddr>,
    secure: bool,
}

impl Method {
    /// Parses an HTTP method from its case-sensitive token.
    ///
    /// # Example
    ///
    /// ```
    /// # use portcullis::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            "TRACE" => Some(Method::TRACE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::TRACE => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            target: None,
            version: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            peer: None,
            secure: false,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Appends a header; repeated names are kept.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            target: self.target.ok_or("target missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body,
            peer: self.peer,
            secure: self.secure,
        })
    }
}

impl Request {
    /// Retrieves the first value of a header, ignoring name case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// The request target reduced to origin-form (`/path?query`).
    ///
    /// Forward-proxy clients send absolute-form targets; only their path and
    /// query survive. An empty or unparseable target becomes `/`.
    pub fn path_and_query(&self) -> String {
        if self.target.starts_with('/') {
            return self.target.clone();
        }

        match url::Url::parse(&self.target) {
            Ok(url) => match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            },
            Err(_) => "/".to_string(),
        }
    }

    /// The path component without the query string.
    pub fn path(&self) -> String {
        let full = self.path_and_query();
        match full.split_once('?') {
            Some((path, _)) => path.to_string(),
            None => full,
        }
    }

    /// Value of `X-Forwarded-For`, or an empty string.
    pub fn forwarded_for(&self) -> &str {
        self.header("X-Forwarded-For").unwrap_or("")
    }

    /// The client address: the directly observed peer IP, falling back to
    /// `X-Forwarded-For`, else empty.
    pub fn client_ip(&self) -> String {
        match self.peer {
            Some(peer) => peer.ip().to_string(),
            None => self.forwarded_for().to_string(),
        }
    }

    /// Determines whether the connection should remain open after the response.
    ///
    /// `Connection: close` always closes and `Connection: keep-alive` always
    /// keeps. Otherwise HTTP/1.1 defaults to keep-alive and HTTP/1.0 to close.
    pub fn keep_alive(&self) -> bool {
        if self.headers.has_token("Connection", "close") {
            return false;
        }
        if self.headers.has_token("Connection", "keep-alive") {
            return true;
        }
        self.version != "HTTP/1.0"
    }
}
