//! Process configuration.
//!
//! Built once at startup and shared read-only. Values come from an optional
//! YAML file named by `PROXY_CONFIG`, then environment variables override
//! individual fields. Anything unset falls back to the defaults below,
//! including the well-known `admin`/`admin` credential, which is insecure and
//! only meant for local use.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind; all interfaces by default.
    pub host: String,
    pub port: u16,
    /// Largest request body accepted from a client.
    pub max_body_bytes: usize,
}

/// The single credential every request must present.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Origin used for requests addressed to the proxy itself
    /// (reverse-proxy mode), e.g. `http://127.0.0.1:8080`. Scheme and
    /// authority only; an origin with a path is rejected at startup.
    pub default_origin: Option<String>,
    pub connect_timeout_secs: u64,
    pub response_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl AuthConfig {
    /// True while the built-in credential is in effect.
    pub fn is_default(&self) -> bool {
        self.username == DEFAULT_USERNAME && self.password == DEFAULT_PASSWORD
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Loads configuration using `lookup` in place of the environment.
    ///
    /// Empty values fall back to the defaults just like missing ones.
    pub fn load_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let mut cfg = match lookup("PROXY_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(port) = lookup("PORT") {
            cfg.server.port = parse_var("PORT", port)?;
        }
        if let Some(username) = lookup("PROXY_USERNAME") {
            cfg.auth.username = username;
        }
        if let Some(password) = lookup("PROXY_PASSWORD") {
            cfg.auth.password = password;
        }
        if let Some(origin) = lookup("PROXY_ORIGIN") {
            cfg.upstream.default_origin = Some(origin);
        }
        if let Some(secs) = lookup("PROXY_CONNECT_TIMEOUT_SECS") {
            cfg.upstream.connect_timeout_secs = parse_var("PROXY_CONNECT_TIMEOUT_SECS", secs)?;
        }
        if let Some(secs) = lookup("PROXY_RESPONSE_TIMEOUT_SECS") {
            cfg.upstream.response_timeout_secs = parse_var("PROXY_RESPONSE_TIMEOUT_SECS", secs)?;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// The `host:port` the listener binds.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            default_origin: None,
            connect_timeout_secs: 10,
            response_timeout_secs: 30,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
