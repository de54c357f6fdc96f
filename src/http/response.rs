use std::fmt;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::http::headers::HeaderMap;

/// HTTP status code.
///
/// A thin wrapper over the numeric code so that upstream statuses pass
/// through unchanged. The constants cover the codes the proxy produces itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    /// Builds a status from its numeric value; only 100..=999 is valid.
    pub fn from_u16(code: u16) -> Option<Self> {
        (100..=999).contains(&code).then_some(StatusCode(code))
    }

    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use portcullis::http::response::StatusCode;
    /// assert_eq!(StatusCode::OK.as_u16(), 200);
    /// assert_eq!(StatusCode::UNAUTHORIZED.as_u16(), 401);
    /// ```
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the standard reason phrase, or an empty string for codes the
    /// proxy has no phrase for.
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            409 => "Conflict",
            413 => "Payload Too Large",
            415 => "Unsupported Media Type",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "",
        }
    }

    /// Statuses that never carry a body.
    pub fn forbids_body(&self) -> bool {
        (100..200).contains(&self.0) || self.0 == 204 || self.0 == 304
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// How a streamed body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Exactly this many bytes (`Content-Length`).
    Length(u64),
    /// Raw chunked encoding, passed through as-is.
    Chunked,
    /// Body ends when the connection closes.
    Close,
}

/// Response payload.
pub enum Body {
    /// Fully buffered body produced by the proxy itself.
    Full(Bytes),
    /// Body relayed from an upstream as it arrives.
    Stream { reader: BodyReader, framing: Framing },
}

impl Body {
    pub fn empty() -> Self {
        Body::Full(Bytes::new())
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Body::Stream { framing, .. } => f.debug_struct("Stream").field("framing", framing).finish(),
        }
    }
}

/// A complete HTTP response ready to be sent to a client.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// HTTP headers, excluding `Connection` which the writer owns
    pub headers: HeaderMap,
    /// Response body
    pub body: Body,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    /// Replaces any existing value of the header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Replaces the whole header set, keeping repeated names.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets a buffered body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Full(body.into());
        self
    }

    /// Sets a streamed body.
    pub fn stream(mut self, reader: BodyReader, framing: Framing) -> Self {
        self.body = Body::Stream { reader, framing };
        self
    }

    /// Builds the final Response.
    ///
    /// Buffered bodies get a `Content-Length` unless one is already set.
    /// Streamed bodies keep the framing headers they came with.
    pub fn build(mut self) -> Response {
        if let Body::Full(bytes) = &self.body {
            if !self.headers.contains("Content-Length") {
                self.headers.insert("Content-Length", bytes.len().to_string());
            }
        }

        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    pub fn builder(status: StatusCode) -> ResponseBuilder {
        ResponseBuilder::new(status)
    }

    /// A plain-text response.
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .build()
    }

    /// A JSON response with an already serialized body.
    pub fn json(status: StatusCode, body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(status)
            .header("Content-Type", "application/json; charset=utf-8")
            .body(body)
            .build()
    }

    pub fn bad_request() -> Self {
        Response::text(StatusCode::BAD_REQUEST, "Bad Request")
    }

    pub fn payload_too_large() -> Self {
        Response::text(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
    }

    /// Whether the client connection may be reused after this response.
    ///
    /// False only for bodies that end at connection close.
    pub fn allows_keep_alive(&self) -> bool {
        !matches!(
            self.body,
            Body::Stream {
                framing: Framing::Close,
                ..
            }
        )
    }
}
