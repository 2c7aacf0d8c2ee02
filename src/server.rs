//! SOCKS5 server
//!
//! Owns the listening socket and spawns one task per accepted connection.

use crate::config::ServerConfig;
use crate::error::Socks5Error;
use crate::socks::{handle_socks5_on_stream, AuthPolicy, ServerContext};
use crate::transport::{SocketOpts, TcpDialer};
use anyhow::{Context, Result};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info, warn};

/// Pause after a failed accept
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Main Socksd server
pub struct Server {
    /// Listening socket
    listener: TcpListener,
    /// State shared with every session
    context: Arc<ServerContext<TcpDialer>>,
    /// Concurrent session limit, if any
    limiter: Option<Arc<Semaphore>>,
    /// Options applied to accepted client sockets
    socket_opts: SocketOpts,
}

impl Server {
    /// Bind the listener described by `config`
    pub async fn bind(config: &ServerConfig, policy: AuthPolicy) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

        let limiter = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let context = ServerContext::new(policy, TcpDialer::from_config(config), &config.timeouts);

        Ok(Server {
            listener,
            context: Arc::new(context),
            limiter,
            socket_opts: SocketOpts::from_tcp_config(&config.tcp),
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!(
            "SOCKS5 server listening on {} (auth: {})",
            self.local_addr()?,
            self.context.policy.method()
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_session(stream, peer),
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Start a session task for an accepted connection
    fn spawn_session(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let permit = match &self.limiter {
            Some(limiter) => match limiter.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!("Connection limit reached, closing connection from {}", peer);
                    return;
                }
            },
            None => None,
        };

        if let Err(e) = self.socket_opts.apply(&stream) {
            warn!("Failed to apply socket options for {}: {}", peer, e);
        }

        debug!("Accepted connection from {}", peer);
        let context = self.context.clone();

        tokio::spawn(async move {
            let _permit = permit;
            match handle_socks5_on_stream(stream, peer, &context).await {
                Ok(session) => info!(
                    "Session {} -> {} closed ({} bytes up, {} bytes down)",
                    session.peer,
                    session.destination,
                    session.stats.client_to_target,
                    session.stats.target_to_client
                ),
                Err(e) => log_session_error(peer, &e),
            }
        });
    }
}

/// Log a failed session once, quietly if the client just went away
fn log_session_error(peer: SocketAddr, e: &Socks5Error) {
    if e.is_eof() {
        debug!("Client {} disconnected: {}", peer, e);
    } else {
        warn!("Session from {} failed: {}", peer, e);
    }
}
