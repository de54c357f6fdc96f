use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::response::{Body, Framing, Response};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Headers owned by the connection rather than the response.
const CONNECTION_HEADERS: [&str; 2] = ["Connection", "Keep-Alive"];

fn serialize_head(resp: &Response, keep_alive: bool) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in resp.headers.iter() {
        if CONNECTION_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(k)) {
            continue;
        }
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    let connection = if keep_alive { "keep-alive" } else { "close" };
    buf.extend_from_slice(format!("Connection: {connection}\r\n").as_bytes());

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Writes one response to a client stream.
///
/// Buffered bodies go out together with the head; streamed bodies are copied
/// from their reader as they arrive.
pub struct ResponseWriter {
    head: Vec<u8>,
    written: usize,
    body: Option<Body>,
}

impl ResponseWriter {
    /// `send_body` is false for `HEAD` requests and body-less statuses; the
    /// headers still describe the body that would have been sent.
    pub fn new(response: Response, keep_alive: bool, send_body: bool) -> Self {
        let mut head = serialize_head(&response, keep_alive);
        let send_body = send_body && !response.status.forbids_body();

        let body = match response.body {
            Body::Full(bytes) => {
                if send_body {
                    head.extend_from_slice(&bytes);
                }
                None
            }
            stream @ Body::Stream { .. } if send_body => Some(stream),
            Body::Stream { .. } => None,
        };

        Self { head, written: 0, body }
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.head.len() {
            let n = stream.write(&self.head[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        if let Some(Body::Stream { reader, framing }) = self.body.take() {
            match framing {
                Framing::Length(expected) => {
                    let copied = tokio::io::copy(&mut reader.take(expected), stream).await?;
                    if copied < expected {
                        return Err(anyhow::anyhow!(
                            "upstream body ended after {copied} of {expected} bytes"
                        ));
                    }
                }
                Framing::Chunked | Framing::Close => {
                    let mut reader = reader;
                    tokio::io::copy(&mut reader, stream).await?;
                }
            }
        }

        stream.flush().await?;
        Ok(())
    }
}
