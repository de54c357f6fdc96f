//! Portcullis - Authenticating HTTP Proxy
//!
//! Forwards requests either to the host named in their `Host` header
//! (forward proxy) or to a configured origin (reverse proxy), after checking
//! Basic credentials sent in `Authorization` or `Proxy-Authorization`.

pub mod auth;
pub mod config;
pub mod http;
pub mod proxy;
pub mod server;
