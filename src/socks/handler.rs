//! Main SOCKS5 handler
//!
//! This module provides the entry point for serving one client connection.
//! It runs negotiation, request dispatch and relay in order, each under its
//! own deadline.

use crate::config::TimeoutConfig;
use crate::error::Socks5Error;
use crate::socks::auth::{authenticate, AuthPolicy};
use crate::socks::command::{dispatch, read_request};
use crate::socks::tcp_relay::{relay_tcp, RelayStats};
use crate::socks::types::{AuthMethod, TargetAddr};
use crate::transport::Dialer;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

/// Read-only state shared by every session of a server
#[derive(Debug)]
pub struct ServerContext<D> {
    /// Authentication policy
    pub policy: AuthPolicy,
    /// Outbound connector, applying its own connect timeout
    pub dialer: D,
    /// Deadline for negotiation, for the request, and for writing the reply
    pub handshake_timeout: Duration,
    /// Deadline armed on the remaining relay direction
    pub idle_timeout: Duration,
}

impl<D: Dialer> ServerContext<D> {
    /// Create a context using the configured deadlines
    pub fn new(policy: AuthPolicy, dialer: D, timeouts: &TimeoutConfig) -> Self {
        ServerContext {
            policy,
            dialer,
            handshake_timeout: timeouts.handshake(),
            idle_timeout: timeouts.idle(),
        }
    }

    /// Override the handshake deadline
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Override the relay idle deadline
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// What is known about a session once it has finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Client address
    pub peer: SocketAddr,
    /// Negotiated authentication method
    pub method: AuthMethod,
    /// Authenticated username, for username/password sessions
    pub username: Option<String>,
    /// Destination the client connected to
    pub destination: TargetAddr,
    /// Relay byte counts
    pub stats: RelayStats,
}

/// Handle SOCKS5 protocol on a client stream
///
/// # Protocol Flow
///
/// 1. Method negotiation and optional username/password authentication,
///    bounded by the handshake timeout
/// 2. Request decoding, bounded by the handshake timeout
/// 3. Destination dial, bounded by the dialer's connect timeout
/// 4. Reply write, bounded by the handshake timeout
/// 5. Relay until one side closes, then the idle timeout
///
/// The client stream and the destination stream are dropped on every
/// return path.
pub async fn handle_socks5_on_stream<S, D>(
    mut stream: S,
    peer: SocketAddr,
    ctx: &ServerContext<D>,
) -> Result<Session, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    D: Dialer,
{
    let handshake = ctx.handshake_timeout;

    let negotiation = authenticate(&mut stream, &ctx.policy);
    let outcome = with_deadline(handshake, "negotiation", negotiation).await?;
    debug!("{} authenticated with {}", peer, outcome.method);

    let request = with_deadline(handshake, "request", read_request(&mut stream)).await?;
    let (target_stream, destination) =
        dispatch(&mut stream, request, &ctx.dialer, handshake).await?;

    info!("{} connected to {}", peer, destination);

    let stats = relay_tcp(stream, target_stream, ctx.idle_timeout).await?;

    Ok(Session {
        peer,
        method: outcome.method,
        username: outcome.username,
        destination,
        stats,
    })
}

/// Run a session phase, failing with [`Socks5Error::Timeout`] past `limit`
async fn with_deadline<T, F>(
    limit: Duration,
    phase: &'static str,
    fut: F,
) -> Result<T, Socks5Error>
where
    F: Future<Output = Result<T, Socks5Error>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Socks5Error::Timeout(phase))?
}
