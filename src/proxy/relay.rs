//! Request relaying
//!
//! Turns an authorized client request into an outbound request, sends it
//! through an [`UpstreamClient`] and streams the answer back. Any failure on
//! the way becomes one uniform 500 response; nothing is retried.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::http::request::Request;
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::proxy::client::{OutboundRequest, UpstreamClient};
use crate::proxy::target::ResolvedTarget;

pub const PROXY_ERROR_BODY: &str = "Proxy error occurred";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no default origin configured for self-addressed request")]
    NoDefaultOrigin,

    #[error("invalid upstream target {target:?}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("upstream request failed: {0:#}")]
    Upstream(anyhow::Error),
}

pub struct RequestRelay {
    client: Arc<dyn UpstreamClient>,
    default_origin: Option<Url>,
}

impl RequestRelay {
    pub fn new(client: Arc<dyn UpstreamClient>, default_origin: Option<Url>) -> Self {
        Self { client, default_origin }
    }

    /// Forwards the request and returns the upstream response, or the
    /// uniform proxy error response if anything fails.
    pub async fn relay(&self, request: Request, target: ResolvedTarget) -> Response {
        let method = request.method;
        let target_desc = request.target.clone();

        match self.forward(request, &target).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    method = %method,
                    target = %target_desc,
                    error = %e,
                    "Proxy error"
                );
                Self::proxy_error()
            }
        }
    }

    async fn forward(&self, request: Request, target: &ResolvedTarget) -> Result<Response, RelayError> {
        let outbound = self.build_outbound(request, target)?;
        let method = outbound.method;
        let url = outbound.url.clone();

        let upstream = self.client.send(outbound).await.map_err(RelayError::Upstream)?;

        info!(
            method = %method,
            url = %url,
            status = upstream.status.as_u16(),
            "Request forwarded"
        );

        Ok(ResponseBuilder::new(upstream.status)
            .headers(upstream.headers)
            .stream(upstream.body, upstream.framing)
            .build())
    }

    /// Builds the outbound request.
    ///
    /// `Proxy-Authorization` is removed here and nowhere else; the URL is the
    /// resolved origin (or the default origin for self-addressed requests)
    /// with its path and query replaced by the request's. The request target
    /// never changes the scheme or authority.
    pub fn build_outbound(&self, request: Request, target: &ResolvedTarget) -> Result<OutboundRequest, RelayError> {
        let base = match target {
            ResolvedTarget::Absolute(origin) => Url::parse(origin).map_err(|source| RelayError::InvalidTarget {
                target: origin.clone(),
                source,
            })?,
            ResolvedTarget::Unresolved => self.default_origin.clone().ok_or(RelayError::NoDefaultOrigin)?,
        };

        let path_and_query = request.path_and_query();
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query.as_str(), None),
        };

        let mut url = base;
        url.set_path(path);
        url.set_query(query);
        url.set_fragment(None);

        let mut headers = request.headers;
        headers.remove("Proxy-Authorization");

        Ok(OutboundRequest {
            method: request.method,
            url,
            headers,
            body: request.body,
        })
    }

    /// The 500 sent when relaying fails.
    pub fn proxy_error() -> Response {
        Response::text(StatusCode::INTERNAL_SERVER_ERROR, PROXY_ERROR_BODY)
    }
}
