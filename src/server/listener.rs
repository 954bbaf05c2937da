use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tracing::info;

use crate::config::Config;
use crate::http::connection::Connection;
use crate::relay::RelayHandler;

/// Accept loop for the relay.
///
/// Each connection runs in its own task; at most `max_connections` run at once.
pub struct Listener {
    inner: TcpListener,
    handler: Arc<RelayHandler>,
    connection_limit: Arc<Semaphore>,
    idle_timeout: Duration,
}

/// Pause after a failed accept, so descriptor exhaustion does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

impl Listener {
    pub async fn bind(cfg: &Config) -> anyhow::Result<Self> {
        let addr = cfg.listen_socket_addr()?;
        let handler = RelayHandler::new(cfg)?;

        let inner = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        Ok(Self {
            inner,
            handler: Arc::new(handler),
            connection_limit: Arc::new(Semaphore::new(cfg.max_connections)),
            idle_timeout: cfg.idle_timeout(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Serves until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The listening socket is closed when this returns. Connections already
    /// being served finish on their own.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!("Listening on {}", self.local_addr()?);

        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                permit = self.connection_limit.clone().acquire_owned() => {
                    permit.context("connection limiter closed")?
                }
            };

            let (socket, peer) = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                accepted = self.inner.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            tracing::debug!("Accepted connection from {}", peer);

            let handler = Arc::clone(&self.handler);
            let idle_timeout = self.idle_timeout;
            tokio::spawn(async move {
                let _permit = permit;
                let mut conn = Connection::new(socket, peer, handler, idle_timeout);
                if let Err(e) = conn.run().await {
                    tracing::error!("Connection error from {}: {}", peer, e);
                }
            });
        }

        info!("Listener stopped");
        Ok(())
    }
}

/// Resolves once shutdown is signalled or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
