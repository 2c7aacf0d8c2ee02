//! SOCKS5 module for Socksd
//!
//! This module implements the server side of SOCKS5 (RFC 1928) with
//! username/password authentication (RFC 1929). Only CONNECT to IPv4 and
//! domain-name destinations is served; other requests are answered with
//! the matching failure reply.

pub mod auth;
pub mod codec;
mod command;
mod consts;
mod handler;
mod tcp_relay;
mod types;

pub use auth::{
    authenticate, AuthOutcome, AuthPolicy, CredentialVerifier, StaticCredentials, VerifyFn,
};
pub use command::{dispatch, handle_request, read_request};
pub use consts::*;
pub use handler::{handle_socks5_on_stream, ServerContext, Session};
pub use tcp_relay::{relay_tcp, RelayStats};
pub use types::{AuthMethod, SocksCommand, TargetAddr};
