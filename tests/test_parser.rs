use portcullis::http::parser::{MAX_CHUNK_LINE, ParseError, parse_http_request};
use portcullis::http::request::Method;

const LIMIT: usize = 1024;

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req, LIMIT).unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.target, "/");
    assert_eq!(parsed.version, "HTTP/1.1");
    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_post_request_with_body() {
    let req = b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = parse_http_request(req, LIMIT).unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.target, "/api");
    assert_eq!(&parsed.body[..], b"hello");
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_pipelined_requests() {
    let req = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
    let (first, consumed) = parse_http_request(req, LIMIT).unwrap();
    let (second, _) = parse_http_request(&req[consumed..], LIMIT).unwrap();

    assert_eq!(first.target, "/a");
    assert_eq!(second.target, "/b");
}

#[test]
fn test_parse_absolute_form_target() {
    let req = b"GET http://example.com/search?q=rust HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, _) = parse_http_request(req, LIMIT).unwrap();

    assert_eq!(parsed.target, "http://example.com/search?q=rust");
    assert_eq!(parsed.path_and_query(), "/search?q=rust");
}

#[test]
fn test_parse_header_lookup_ignores_case() {
    let req = b"GET / HTTP/1.1\r\nproxy-authorization: Basic YWRtaW46YWRtaW4=\r\n\r\n";
    let (parsed, _) = parse_http_request(req, LIMIT).unwrap();

    assert_eq!(parsed.header("Proxy-Authorization"), Some("Basic YWRtaW46YWRtaW4="));
}

#[test]
fn test_parse_repeated_headers_are_kept() {
    let req = b"GET / HTTP/1.1\r\nX-Forwarded-For: 10.0.0.1\r\nX-Forwarded-For: 10.0.0.2\r\n\r\n";
    let (parsed, _) = parse_http_request(req, LIMIT).unwrap();

    let values: Vec<_> = parsed.headers.get_all("x-forwarded-for").collect();
    assert_eq!(values, vec!["10.0.0.1", "10.0.0.2"]);
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    let result = parse_http_request(req, LIMIT);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_incomplete_request_partial_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
    let result = parse_http_request(req, LIMIT);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_invalid_http_method() {
    let req = b"CONNECT example.com:443 HTTP/1.1\r\n\r\n";
    let result = parse_http_request(req, LIMIT);

    assert!(matches!(result, Err(ParseError::InvalidMethod)));
}

#[test]
fn test_parse_malformed_header() {
    let req = b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n";
    let result = parse_http_request(req, LIMIT);

    assert!(matches!(result, Err(ParseError::InvalidHeader)));
}

#[test]
fn test_parse_invalid_content_length() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n";
    let result = parse_http_request(req, LIMIT);

    assert!(matches!(result, Err(ParseError::InvalidContentLength)));
}

#[test]
fn test_parse_rejects_non_http_version() {
    let req = b"GET / SPDY/3\r\n\r\n";
    let result = parse_http_request(req, LIMIT);

    assert!(matches!(result, Err(ParseError::InvalidRequest)));
}

#[test]
fn test_parse_oversized_head() {
    let mut req = b"GET / HTTP/1.1\r\nX-Big: ".to_vec();
    req.extend(std::iter::repeat_n(b'a', 70 * 1024));
    let result = parse_http_request(&req, LIMIT);

    assert!(matches!(result, Err(ParseError::HeadTooLarge)));
}

#[test]
fn test_parse_bad_chunk_size() {
    let req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nabc\r\n0\r\n\r\n";
    let result = parse_http_request(req, LIMIT);

    assert!(matches!(result, Err(ParseError::InvalidChunk)));
}

#[test]
fn test_parse_request_with_binary_body() {
    let req = b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03";
    let (parsed, _) = parse_http_request(req, LIMIT).unwrap();

    assert_eq!(&parsed.body[..], &[0, 1, 2, 3]);
}

#[test]
fn test_parse_endless_chunk_size_line() {
    let mut req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    req.extend(std::iter::repeat_n(b'1', 5 * 1024 * 1024));
    let result = parse_http_request(&req, LIMIT);

    assert!(matches!(result, Err(ParseError::InvalidChunk)));
}

#[test]
fn test_parse_overlong_chunk_extension() {
    let mut req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3;ext=".to_vec();
    req.extend(std::iter::repeat_n(b'x', MAX_CHUNK_LINE));
    req.extend_from_slice(b"\r\nabc\r\n0\r\n\r\n");
    let result = parse_http_request(&req, LIMIT);

    assert!(matches!(result, Err(ParseError::InvalidChunk)));
}

#[test]
fn test_parse_oversized_chunked_trailers() {
    let mut req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n".to_vec();
    for _ in 0..2000 {
        req.extend_from_slice(b"X-Trailer: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n");
    }
    let result = parse_http_request(&req, LIMIT);

    assert!(matches!(result, Err(ParseError::HeadTooLarge)));
}

#[test]
fn test_parse_chunked_body_over_limit() {
    let req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n800\r\n";
    let result = parse_http_request(req, LIMIT);

    assert!(matches!(result, Err(ParseError::BodyTooLarge)));
}
