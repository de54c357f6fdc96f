//! The proxy pipeline
//!
//! [`ProxyServer`] runs every inbound request through
//! log → health bypass → extract credentials → authorize → resolve → relay.
//! It holds no mutable state, so one instance is shared by all connections.

pub mod listener;

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::info;
use url::Url;

use crate::auth::{Authenticator, CredentialExtractor, Decision};
use crate::config::{Config, ConfigError};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::proxy::{RequestRelay, SelfIdentity, TargetResolver, UpstreamClient};

pub const HEALTH_PATH: &str = "/health";

pub struct ProxyServer {
    config: Config,
    extractor: CredentialExtractor,
    authenticator: Authenticator,
    resolver: TargetResolver,
    relay: RequestRelay,
}

impl ProxyServer {
    /// Wires the pipeline for a proxy listening on `port`.
    ///
    /// Fails if the configured default origin is not a valid URL or carries
    /// a path or query.
    pub fn new(config: Config, port: u16, client: Arc<dyn UpstreamClient>) -> Result<Self, ConfigError> {
        let default_origin = config
            .upstream
            .default_origin
            .as_deref()
            .map(|origin| {
                let invalid = || ConfigError::InvalidValue {
                    key: "upstream.default_origin",
                    value: origin.to_string(),
                };
                let url = Url::parse(origin).map_err(|_| invalid())?;
                // Only scheme and authority are used; a path would be dropped
                if url.path() != "/" || url.query().is_some() {
                    return Err(invalid());
                }
                Ok(url)
            })
            .transpose()?;

        Ok(Self {
            extractor: CredentialExtractor,
            authenticator: Authenticator::new(&config.auth),
            resolver: TargetResolver::new(SelfIdentity { port }),
            relay: RequestRelay::new(client, default_origin),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn identity(&self) -> SelfIdentity {
        self.resolver.identity()
    }

    /// Runs one request through the pipeline. Never fails: every error is
    /// turned into a response for this request alone.
    pub async fn handle(&self, request: Request) -> Response {
        info!(
            timestamp = %Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            method = %request.method,
            url = %request.target,
            "Request"
        );

        if is_health_check(&request) {
            return Self::health();
        }

        let candidates = self.extractor.extract(&request);
        if self.authenticator.authorize(&candidates) == Decision::Deny {
            info!(client_ip = %request.client_ip(), "Authentication required");
            return Authenticator::challenge();
        }

        let target = self.resolver.resolve(&request);
        self.relay.relay(request, target).await
    }

    /// Liveness response; bypasses authentication and relaying.
    pub fn health() -> Response {
        let body = serde_json::json!({ "status": "healthy" }).to_string();
        Response::json(StatusCode::OK, body)
    }
}

fn is_health_check(request: &Request) -> bool {
    if !matches!(request.method, Method::GET | Method::HEAD) {
        return false;
    }
    let path = request.path();
    path == HEALTH_PATH || path.strip_suffix('/') == Some(HEALTH_PATH)
}
