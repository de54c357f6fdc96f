use bytes::Bytes;

use crate::http::headers::HeaderMap;
use crate::http::request::{Method, Request};

/// Largest accepted request head (request line plus headers). Also bounds
/// the trailer section of a chunked body.
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Longest accepted chunk-size line, extensions included.
pub const MAX_CHUNK_LINE: usize = 4096;

/// Most bytes one request may occupy on the wire before it is refused:
/// head, body, chunk framing and trailers.
pub fn max_request_bytes(max_body: usize) -> usize {
    max_body
        .saturating_add(max_body / 4)
        .saturating_add(2 * MAX_HEAD_BYTES)
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidHeader,
    InvalidContentLength,
    InvalidChunk,
    HeadTooLarge,
    BodyTooLarge,
    Incomplete,
}

/// Parses one request from the front of `buf`.
///
/// Returns the request and the number of bytes it occupied, or
/// [`ParseError::Incomplete`] if more data is needed. Bodies are framed by
/// `Content-Length` or `Transfer-Encoding: chunked`; chunked bodies are
/// decoded. Bodies above `max_body` bytes are rejected. The returned request
/// has no peer address and is not marked secure.
pub fn parse_http_request(buf: &[u8], max_body: usize) -> Result<(Request, usize), ParseError> {
    parse_http_request_with(buf, max_body, &mut ChunkScan::default())
}

/// Progress through a chunked body that is still arriving.
///
/// Lets repeated parses of a growing buffer skip the chunks already
/// validated. Only valid while the bytes before `offset` stay unchanged;
/// start a fresh one for each request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkScan {
    offset: usize,
    body_len: usize,
}

/// [`parse_http_request`], resuming a chunked body from `scan`.
pub fn parse_http_request_with(
    buf: &[u8],
    max_body: usize,
    scan: &mut ChunkScan,
) -> Result<(Request, usize), ParseError> {
    // Look for header/body separator
    let headers_end = match find_headers_end(buf) {
        Some(end) => end,
        None if buf.len() > MAX_HEAD_BYTES => return Err(ParseError::HeadTooLarge),
        None => return Err(ParseError::Incomplete),
    };
    let header_bytes = &buf[..headers_end];
    let body_start = headers_end + 4;

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if parts.next().is_some() || !version.starts_with("HTTP/1.") {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    // Headers
    let mut headers = HeaderMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::InvalidHeader);
        }

        headers.append(key, value.trim());
    }

    // Body
    let (body, body_len) = if headers.has_token("Transfer-Encoding", "chunked") {
        let encoded = &buf[body_start..];
        let end = scan_chunked(encoded, max_body, scan)?;
        (collect_chunks(&encoded[..end], scan.body_len)?, end)
    } else {
        let content_length = headers
            .get("Content-Length")
            .map(|v| v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
            .transpose()?
            .unwrap_or(0);

        if content_length > max_body {
            return Err(ParseError::BodyTooLarge);
        }

        let available = &buf[body_start..];
        if available.len() < content_length {
            return Err(ParseError::Incomplete);
        }

        (available[..content_length].to_vec(), content_length)
    };

    let request = Request {
        method,
        target: target.to_string(),
        version: version.to_string(),
        headers,
        body: Bytes::from(body),
        peer: None,
        secure: false,
    };

    Ok((request, body_start + body_len))
}

/// Walks the chunk framing from `scan` onwards and returns the encoded
/// length of the whole body (last chunk and trailers included).
fn scan_chunked(buf: &[u8], max_body: usize, scan: &mut ChunkScan) -> Result<usize, ParseError> {
    loop {
        let (size, line_len) = read_chunk_size(&buf[scan.offset..])?;
        let data_start = scan.offset + line_len;

        if size == 0 {
            return Ok(data_start + find_trailers_end(&buf[data_start..])?);
        }

        if size > max_body - scan.body_len {
            return Err(ParseError::BodyTooLarge);
        }
        if buf.len() - data_start < size + 2 {
            return Err(ParseError::Incomplete);
        }
        if &buf[data_start + size..data_start + size + 2] != b"\r\n" {
            return Err(ParseError::InvalidChunk);
        }

        scan.offset = data_start + size + 2;
        scan.body_len += size;
    }
}

/// Copies the payload out of a complete, already validated chunked body.
fn collect_chunks(buf: &[u8], body_len: usize) -> Result<Vec<u8>, ParseError> {
    let mut body = Vec::with_capacity(body_len);
    let mut pos = 0;

    loop {
        let (size, line_len) = read_chunk_size(&buf[pos..])?;
        pos += line_len;
        if size == 0 {
            return Ok(body);
        }
        body.extend_from_slice(&buf[pos..pos + size]);
        pos += size + 2;
    }
}

/// Reads a chunk-size line, returning the size and the line length
/// including its CRLF.
fn read_chunk_size(buf: &[u8]) -> Result<(usize, usize), ParseError> {
    let window = &buf[..buf.len().min(MAX_CHUNK_LINE + 2)];
    let line_end = match find_crlf(window) {
        Some(end) => end,
        None if buf.len() >= MAX_CHUNK_LINE + 2 => return Err(ParseError::InvalidChunk),
        None => return Err(ParseError::Incomplete),
    };

    let size_line = std::str::from_utf8(&buf[..line_end]).map_err(|_| ParseError::InvalidChunk)?;
    let size_hex = size_line.split(';').next().unwrap_or("").trim();
    let size = usize::from_str_radix(size_hex, 16).map_err(|_| ParseError::InvalidChunk)?;

    Ok((size, line_end + 2))
}

/// Finds the empty line closing the trailer section and returns the
/// section's length including it.
fn find_trailers_end(buf: &[u8]) -> Result<usize, ParseError> {
    let mut pos = 0;

    while let Some(end) = find_crlf(&buf[pos..]) {
        pos += end + 2;
        if end == 0 {
            return Ok(pos);
        }
        if pos > MAX_HEAD_BYTES {
            return Err(ParseError::HeadTooLarge);
        }
    }

    if buf.len() > MAX_HEAD_BYTES {
        Err(ParseError::HeadTooLarge)
    } else {
        Err(ParseError::Incomplete)
    }
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req, 1024).unwrap();

        assert_eq!(parsed.target, "/");
        assert_eq!(parsed.headers.get("host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn parse_chunked_body() {
        let req = b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\nX-Trailer: y\r\n\r\nGET";

        let (parsed, consumed) = parse_http_request(req, 1024).unwrap();

        assert_eq!(&parsed.body[..], b"Wikipedia");
        assert_eq!(&req[consumed..], b"GET");
    }

    #[test]
    fn chunked_body_waits_for_last_chunk() {
        let req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n";

        assert_eq!(parse_http_request(req, 1024).unwrap_err(), ParseError::Incomplete);
    }

    #[test]
    fn chunk_scan_resumes_where_it_stopped() {
        let full = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        let partial = &full[..full.len() - 5];
        let mut scan = ChunkScan::default();

        assert_eq!(parse_http_request_with(partial, 1024, &mut scan).unwrap_err(), ParseError::Incomplete);
        assert_eq!(scan.body_len, 9);

        let (parsed, consumed) = parse_http_request_with(full, 1024, &mut scan).unwrap();
        assert_eq!(&parsed.body[..], b"Wikipedia");
        assert_eq!(consumed, full.len());
    }

    #[test]
    fn body_limit_is_enforced() {
        let req = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123456789";

        assert_eq!(parse_http_request(req, 4).unwrap_err(), ParseError::BodyTooLarge);
    }
}
