//! Upstream target resolution
//!
//! Decides whether a request is addressed to the proxy itself or should be
//! forwarded to the host named in its `Host` header.

use crate::http::request::Request;

/// Where a request should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Addressed to the proxy itself; use the default origin.
    Unresolved,
    /// Forward to this `scheme://host` origin.
    Absolute(String),
}

/// How the proxy itself is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfIdentity {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct TargetResolver {
    identity: SelfIdentity,
    own_port_marker: String,
}

impl TargetResolver {
    pub fn new(identity: SelfIdentity) -> Self {
        Self {
            identity,
            own_port_marker: format!(":{}", identity.port),
        }
    }

    pub fn identity(&self) -> SelfIdentity {
        self.identity
    }

    /// Resolves the request's destination from its `Host` header.
    ///
    /// The self-address checks are plain substring tests, so a host such as
    /// `localhost.example.com` or `api.example.com:3000` (when listening on
    /// 3000) is treated as addressed to the proxy.
    pub fn resolve(&self, request: &Request) -> ResolvedTarget {
        let Some(host) = request.header("Host").filter(|h| !h.is_empty()) else {
            return ResolvedTarget::Unresolved;
        };

        if host.contains("localhost") || host.contains("127.0.0.1") || host.contains(&self.own_port_marker) {
            return ResolvedTarget::Unresolved;
        }

        let scheme = if request.secure { "https" } else { "http" };
        ResolvedTarget::Absolute(format!("{scheme}://{host}"))
    }
}
