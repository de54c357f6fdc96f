//! Outbound HTTP client
//!
//! The relay talks to upstreams through [`UpstreamClient`]. [`TcpUpstream`]
//! is the production implementation: plain HTTP/1.1 over a fresh TCP
//! connection per request, response body streamed back to the caller.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::headers::HeaderMap;
use crate::http::request::Method;
use crate::http::response::{BodyReader, Framing, StatusCode};

/// Default buffer size for reading response heads
const BUFFER_SIZE: usize = 8192;

/// Largest accepted upstream response head
const MAX_RESPONSE_HEAD: usize = 64 * 1024;

/// Hop-by-hop headers that never travel to the upstream.
const HOP_BY_HOP: [&str; 8] = [
    "Connection",
    "Keep-Alive",
    "Proxy-Connection",
    "Transfer-Encoding",
    "TE",
    "Trailer",
    "Upgrade",
    "Expect",
];

/// A request ready to be sent upstream.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Status and headers of an upstream response, with its body still in flight.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyReader,
    pub framing: Framing,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("framing", &self.framing)
            .finish()
    }
}

/// Capability to perform one outbound HTTP exchange.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse>;
}

/// Plain-TCP HTTP/1.1 client.
///
/// Every request opens a new connection and asks the upstream to close it
/// afterwards, so close-delimited and chunked bodies both end at EOF.
#[derive(Debug, Clone)]
pub struct TcpUpstream {
    /// Connection timeout duration
    connect_timeout: Duration,

    /// Time allowed until the response head has arrived
    response_timeout: Duration,
}

impl TcpUpstream {
    pub fn new(connect_timeout: Duration, response_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            response_timeout,
        }
    }

    pub fn from_config(cfg: &UpstreamConfig) -> Self {
        Self::new(cfg.connect_timeout(), cfg.response_timeout())
    }

    /// Build HTTP request bytes to send upstream
    ///
    /// Note: public for integration testing purposes
    pub fn build_http_request(&self, request: &OutboundRequest) -> Vec<u8> {
        let mut buffer = Vec::new();

        let mut target = request.url.path().to_string();
        if let Some(query) = request.url.query() {
            target.push('?');
            target.push_str(query);
        }

        buffer.extend_from_slice(format!("{} {} HTTP/1.1\r\n", request.method, target).as_bytes());

        let mut headers = request.headers.clone();

        // Host always names the upstream
        if let Some(host) = request.url.host_str() {
            let host_value = match request.url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            headers.insert("Host", host_value);
        }

        for name in HOP_BY_HOP {
            headers.remove(name);
        }

        // The body is fully buffered, so its length is known
        headers.remove("Content-Length");
        if !request.body.is_empty() || matches!(request.method, Method::POST | Method::PUT | Method::PATCH) {
            headers.insert("Content-Length", request.body.len().to_string());
        }

        headers.insert("Connection", "close");

        for (key, value) in headers.iter() {
            buffer.extend_from_slice(format!("{key}: {value}\r\n").as_bytes());
        }

        // End of headers
        buffer.extend_from_slice(b"\r\n");
        buffer.extend_from_slice(&request.body);

        buffer
    }

    /// Reads the response head, skipping interim 1xx responses.
    ///
    /// Returns the status, headers and whatever body bytes arrived with them.
    async fn read_response_head(&self, stream: &mut TcpStream) -> Result<(StatusCode, HeaderMap, BytesMut)> {
        let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

        loop {
            if let Some(headers_end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
                let head = buffer.split_to(headers_end + 4);
                let (status, headers) = parse_response_head(&head)?;

                if (100..200).contains(&status.as_u16()) && status.as_u16() != 101 {
                    continue;
                }
                return Ok((status, headers, buffer));
            }

            // Prevent unbounded header growth
            if buffer.len() > MAX_RESPONSE_HEAD {
                anyhow::bail!("Response headers too large");
            }

            let n = stream.read_buf(&mut buffer).await?;
            if n == 0 {
                anyhow::bail!("Connection closed before complete response received");
            }
        }
    }
}

#[async_trait]
impl UpstreamClient for TcpUpstream {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse> {
        if request.url.scheme() != "http" {
            anyhow::bail!("Unsupported upstream scheme: {}", request.url.scheme());
        }

        let host = request.url.host_str().context("Upstream URL missing host")?;
        let port = request.url.port_or_known_default().unwrap_or(80);

        let mut stream = timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .context("Connection timeout")?
            .with_context(|| format!("Failed to connect to {host}:{port}"))?;

        tracing::trace!(host, port, "Connected to upstream");

        let request_bytes = self.build_http_request(&request);
        let (status, mut headers, leftover) = timeout(self.response_timeout, async {
            stream.write_all(&request_bytes).await?;
            stream.flush().await?;
            self.read_response_head(&mut stream).await
        })
        .await
        .context("Response timeout")??;

        let framing = response_framing(request.method, status, &headers)?;
        if framing == Framing::Chunked {
            // Chunked framing overrides any length
            headers.remove("Content-Length");
        }

        let body: BodyReader = match framing {
            Framing::Length(0) => Box::new(tokio::io::empty()),
            _ => Box::new(Cursor::new(leftover.freeze()).chain(stream)),
        };

        Ok(UpstreamResponse {
            status,
            headers,
            body,
            framing,
        })
    }
}

/// Parses `HTTP/1.x <code> <reason>` followed by header lines.
fn parse_response_head(head: &[u8]) -> Result<(StatusCode, HeaderMap)> {
    let head = std::str::from_utf8(head).context("Invalid UTF-8 in response headers")?;

    let mut lines = head.split("\r\n");

    let status_line = lines.next().context("Empty response")?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") {
        anyhow::bail!("Invalid status line: {}", status_line);
    }

    let code: u16 = parts
        .next()
        .context("Missing status code")?
        .parse()
        .context("Invalid status code")?;
    let status = StatusCode::from_u16(code).with_context(|| format!("Status code out of range: {code}"))?;

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }

        if let Some((key, value)) = line.split_once(':') {
            headers.append(key.trim(), value.trim());
        }
    }

    Ok((status, headers))
}

/// Determines how the upstream body is delimited.
fn response_framing(method: Method, status: StatusCode, headers: &HeaderMap) -> Result<Framing> {
    if method == Method::HEAD || status.forbids_body() {
        return Ok(Framing::Length(0));
    }
    if headers.has_token("Transfer-Encoding", "chunked") {
        return Ok(Framing::Chunked);
    }
    match headers.get("Content-Length") {
        Some(value) => {
            let length = value.trim().parse().context("Invalid Content-Length from upstream")?;
            Ok(Framing::Length(length))
        }
        None => Ok(Framing::Close),
    }
}
