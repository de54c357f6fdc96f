//! Proxy functionality
//!
//! Target resolution, request relaying and the outbound HTTP client.

pub mod client;
pub mod relay;
pub mod target;

pub use client::{OutboundRequest, TcpUpstream, UpstreamClient, UpstreamResponse};
pub use relay::{RelayError, RequestRelay};
pub use target::{ResolvedTarget, SelfIdentity, TargetResolver};
