//! Tests for upstream target resolution

use portcullis::http::request::{Method, RequestBuilder};
use portcullis::proxy::target::{ResolvedTarget, SelfIdentity, TargetResolver};

fn resolver() -> TargetResolver {
    TargetResolver::new(SelfIdentity { port: 3000 })
}

fn resolve(host: Option<&str>, secure: bool) -> ResolvedTarget {
    let mut builder = RequestBuilder::new().method(Method::GET).target("/").secure(secure);
    if let Some(host) = host {
        builder = builder.header("Host", host);
    }
    resolver().resolve(&builder.build().unwrap())
}

#[test]
fn test_plain_host_forwards_over_http() {
    assert_eq!(
        resolve(Some("example.com"), false),
        ResolvedTarget::Absolute("http://example.com".to_string())
    );
}

#[test]
fn test_secure_transport_forwards_over_https() {
    assert_eq!(
        resolve(Some("example.com"), true),
        ResolvedTarget::Absolute("https://example.com".to_string())
    );
}

#[test]
fn test_host_port_is_kept() {
    assert_eq!(
        resolve(Some("example.com:8080"), false),
        ResolvedTarget::Absolute("http://example.com:8080".to_string())
    );
}

#[test]
fn test_self_addressed_hosts() {
    assert_eq!(resolve(Some("localhost:3000"), false), ResolvedTarget::Unresolved);
    assert_eq!(resolve(Some("localhost"), false), ResolvedTarget::Unresolved);
    assert_eq!(resolve(Some("127.0.0.1:9999"), false), ResolvedTarget::Unresolved);
    assert_eq!(resolve(Some("10.1.2.3:3000"), false), ResolvedTarget::Unresolved);
}

#[test]
fn test_missing_or_empty_host() {
    assert_eq!(resolve(None, false), ResolvedTarget::Unresolved);
    assert_eq!(resolve(Some(""), false), ResolvedTarget::Unresolved);
}

#[test]
fn test_substring_matching_is_literal() {
    // Substring tests, not exact host comparison
    assert_eq!(resolve(Some("localhost.example.com"), false), ResolvedTarget::Unresolved);
    assert_eq!(resolve(Some("api.example.com:30001"), false), ResolvedTarget::Unresolved);
}

#[test]
fn test_other_port_is_not_self() {
    let resolver = TargetResolver::new(SelfIdentity { port: 8080 });
    let request = RequestBuilder::new()
        .method(Method::GET)
        .target("/")
        .header("Host", "example.com:3000")
        .build()
        .unwrap();

    assert_eq!(
        resolver.resolve(&request),
        ResolvedTarget::Absolute("http://example.com:3000".to_string())
    );
}
