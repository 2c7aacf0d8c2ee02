//! # Socksd - SOCKS5 Proxy Server
//!
//! Socksd accepts SOCKS5 clients on a TCP listener, negotiates an
//! authentication method, serves CONNECT requests and relays bytes between
//! the client and the destination.
//!
//! ## Features
//!
//! - **RFC 1928 / RFC 1929**: no-auth and username/password methods
//! - **Pluggable credentials**: any [`socks::CredentialVerifier`] can judge logins
//! - **Per-phase deadlines**: negotiation, request, dial and relay idle time are bounded
//! - **Connection limit**: optional cap on concurrent sessions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksd::config::load_config;
//! use socksd::server::Server;
//! use socksd::socks::AuthPolicy;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let policy = AuthPolicy::from_config(&config.server.auth)?;
//!     let server = Server::bind(&config.server, policy).await?;
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     server.run(shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> Socksd -> Target
//! ```
//!
//! Each connection goes through negotiation, request dispatch and relay in
//! its own task; see [`socks::handle_socks5_on_stream`].

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{Socks5Error, Socks5ReplyCode, SocksdError};
pub use server::Server;

/// Version of the Socksd library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
