use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::http::parser::{max_request_bytes, parse_http_request_with, ChunkScan, ParseError};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::server::ProxyServer;

pub struct Connection<S> {
    stream: S,
    buffer: Vec<u8>,
    scan: ChunkScan,
    state: ConnectionState,
    peer: Option<SocketAddr>,
    server: Arc<ProxyServer>,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

/// Result of waiting for the next request on the connection.
enum Incoming {
    Request(Request),
    /// The bytes could not form a request; answer and close.
    Rejected(Response),
    Eof,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: Option<SocketAddr>, server: Arc<ProxyServer>) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(4096),
            scan: ChunkScan::default(),
            state: ConnectionState::Reading,
            peer,
            server,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match self.read_request().await? {
                        Incoming::Request(req) => ConnectionState::Processing(req),
                        Incoming::Rejected(response) => {
                            ConnectionState::Writing(ResponseWriter::new(response, false, true), false)
                        }
                        Incoming::Eof => ConnectionState::Closed,
                    };
                }

                ConnectionState::Processing(req) => {
                    let wants_keep_alive = req.keep_alive();
                    let send_body = req.method != Method::HEAD;

                    let response = self.server.handle(req).await;
                    let keep_alive = wants_keep_alive && response.allows_keep_alive();

                    let writer = ResponseWriter::new(response, keep_alive, send_body);
                    self.state = ConnectionState::Writing(writer, keep_alive);
                }

                ConnectionState::Writing(mut writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if keep_alive {
                        self.state = ConnectionState::Reading; // go back for next request
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    async fn read_request(&mut self) -> anyhow::Result<Incoming> {
        let max_body = self.server.config().server.max_body_bytes;
        let max_buffer = max_request_bytes(max_body);

        loop {
            // Try parsing whatever we already have
            match parse_http_request_with(&self.buffer, max_body, &mut self.scan) {
                Ok((mut request, consumed)) => {
                    self.buffer.drain(..consumed);
                    self.scan = ChunkScan::default();
                    request.peer = self.peer;
                    return Ok(Incoming::Request(request));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(ParseError::BodyTooLarge) => {
                    tracing::warn!(peer = ?self.peer, "Request body exceeds limit");
                    return Ok(Incoming::Rejected(Response::payload_too_large()));
                }

                Err(e) => {
                    tracing::warn!(peer = ?self.peer, error = ?e, "Malformed request");
                    return Ok(Incoming::Rejected(Response::bad_request()));
                }
            }

            if self.buffer.len() > max_buffer {
                tracing::warn!(peer = ?self.peer, buffered = self.buffer.len(), "Request exceeds buffer limit");
                return Ok(Incoming::Rejected(Response::payload_too_large()));
            }

            // Read more data
            let mut temp = [0u8; 4096];
            let n = self.stream.read(&mut temp).await?;

            if n == 0 {
                // Client closed connection
                return Ok(Incoming::Eof);
            }

            self.buffer.extend_from_slice(&temp[..n]);
        }
    }
}

