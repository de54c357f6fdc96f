//! Credential extraction from request headers.
//!
//! Two independent channels are read: the standard `Authorization` header and
//! `Proxy-Authorization`, which some HTTP clients send when configured to use
//! a proxy. Malformed values on either channel simply yield no credential.

use std::fmt;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use chrono::{SecondsFormat, Utc};
use tracing::info;

use crate::http::request::Request;

/// A username/password pair presented by a client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub pass: String,
}

impl Credential {
    pub fn new(name: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pass: pass.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// At most one candidate credential per channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    /// From `Authorization: Basic ...`
    pub basic: Option<Credential>,
    /// From `Proxy-Authorization: Basic ...`
    pub proxy: Option<Credential>,
}

/// Pulls candidate credentials out of a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialExtractor;

impl CredentialExtractor {
    /// Reads both channels and records the client address.
    ///
    /// Never fails and never mutates the request. The log record carries the
    /// client address and a timestamp, never the decoded credentials.
    pub fn extract(&self, request: &Request) -> Candidates {
        info!(
            client_ip = %request.client_ip(),
            forwarded_ip = %request.forwarded_for(),
            timestamp = %Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "Client connection"
        );

        Candidates {
            basic: request.header("Authorization").and_then(parse_authorization),
            proxy: request.header("Proxy-Authorization").and_then(parse_proxy_authorization),
        }
    }
}

/// Parses an `Authorization` value.
///
/// The scheme is matched case-insensitively and may be surrounded by spaces.
/// The decoded payload must contain a colon; either side of it may be empty.
pub fn parse_authorization(value: &str) -> Option<Credential> {
    let value = value.trim_matches(' ');
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let token = token.trim_start_matches(' ');
    if token.is_empty() || !token.bytes().all(is_token_byte) {
        return None;
    }

    let (name, pass) = decode_pair(token)?;
    Some(Credential::new(name, pass))
}

/// Parses a `Proxy-Authorization` value.
///
/// Requires the literal `Basic ` prefix and non-empty username and password.
pub fn parse_proxy_authorization(value: &str) -> Option<Credential> {
    let rest = value.strip_prefix("Basic ")?;
    let token = rest.split(' ').next()?;

    let (name, pass) = decode_pair(token)?;
    if name.is_empty() || pass.is_empty() {
        return None;
    }
    Some(Credential::new(name, pass))
}

/// Base64-decodes `user:pass`, splitting on the first colon.
fn decode_pair(token: &str) -> Option<(String, String)> {
    let decoded = BASE64_STANDARD.decode(token).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (name, pass) = decoded.split_once(':')?;
    Some((name.to_string(), pass.to_string()))
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(raw: &str) -> String {
        BASE64_STANDARD.encode(raw)
    }

    #[test]
    fn authorization_scheme_is_case_insensitive() {
        let value = format!("bAsIc {}", encode("admin:admin"));

        assert_eq!(parse_authorization(&value), Some(Credential::new("admin", "admin")));
    }

    #[test]
    fn authorization_keeps_colons_in_password() {
        let value = format!("Basic {}", encode("user:pa:ss"));

        assert_eq!(parse_authorization(&value), Some(Credential::new("user", "pa:ss")));
    }

    #[test]
    fn authorization_without_colon_is_absent() {
        let value = format!("Basic {}", encode("nocolon"));

        assert_eq!(parse_authorization(&value), None);
    }

    #[test]
    fn authorization_rejects_other_schemes() {
        assert_eq!(parse_authorization("Bearer abc.def"), None);
        assert_eq!(parse_authorization("Basic"), None);
        assert_eq!(parse_authorization("Basic !!!"), None);
    }

    #[test]
    fn proxy_authorization_requires_exact_prefix() {
        let token = encode("admin:admin");

        assert_eq!(
            parse_proxy_authorization(&format!("Basic {token}")),
            Some(Credential::new("admin", "admin"))
        );
        assert_eq!(parse_proxy_authorization(&format!("basic {token}")), None);
    }

    #[test]
    fn proxy_authorization_requires_both_halves() {
        assert_eq!(parse_proxy_authorization(&format!("Basic {}", encode(":pass"))), None);
        assert_eq!(parse_proxy_authorization(&format!("Basic {}", encode("user:"))), None);
        assert_eq!(parse_proxy_authorization("Basic not-base64!"), None);
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", Credential::new("admin", "hunter2"));

        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
