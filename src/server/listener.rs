use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http::connection::Connection;
use crate::proxy::{TcpUpstream, UpstreamClient};
use crate::server::ProxyServer;

/// A bound listening socket plus the pipeline it feeds.
pub struct Listener {
    listener: TcpListener,
    server: Arc<ProxyServer>,
}

impl Listener {
    /// Binds `cfg.listen_addr()` and forwards with the plain-TCP client.
    pub async fn bind(cfg: Config) -> anyhow::Result<Self> {
        let client = Arc::new(TcpUpstream::from_config(&cfg.upstream));
        Self::bind_with_client(cfg, client).await
    }

    /// Binds with a caller-supplied upstream client.
    ///
    /// The proxy's own port, used to recognise self-addressed requests, is
    /// the port actually bound, so port 0 works.
    pub async fn bind_with_client(cfg: Config, client: Arc<dyn UpstreamClient>) -> anyhow::Result<Self> {
        if cfg.auth.is_default() {
            warn!("PROXY_USERNAME/PROXY_PASSWORD not set, using default credentials");
        }

        let listener = TcpListener::bind(cfg.listen_addr()).await?;
        let port = listener.local_addr()?.port();
        let server = Arc::new(ProxyServer::new(cfg, port, client)?);

        info!("Proxy server running on port {}", port);
        Ok(Self { listener, server })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, one task per connection.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let (socket, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            debug!("Accepted connection from {}", peer);

            let server = Arc::clone(&self.server);
            tokio::spawn(async move {
                let mut conn = Connection::new(socket, Some(peer), server);
                if let Err(e) = conn.run().await {
                    tracing::error!("Connection error from {}: {}", peer, e);
                }
            });
        }
    }
}

/// Binds according to `cfg` and serves until the task is dropped.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    Listener::bind(cfg).await?.run().await
}
