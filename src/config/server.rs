//! Server configuration types
//!
//! Defines the main configuration structures for the socksd server.

use super::TcpConfig;
use crate::socks::AuthMethod;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Default listen address
fn default_listen_addr() -> String {
    "127.0.0.1:1080".to_string()
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()
    }
}

/// Server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:1080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Maximum number of concurrent sessions (0 = unlimited)
    #[serde(default)]
    pub max_connections: usize,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Per-phase deadlines
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Socket options for outbound connections
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
            max_connections: 0,
            auth: AuthConfig::default(),
            timeouts: TimeoutConfig::default(),
            tcp: TcpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid listen address {:?}: {}", self.listen_addr, e))?;
        self.auth.validate()?;
        self.timeouts.validate()
    }
}

/// Authentication configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// Method clients must use ("none" or "password")
    #[serde(default)]
    pub method: AuthMethod,

    /// Username -> password table for password authentication
    #[serde(default)]
    pub users: HashMap<String, String>,
}

impl AuthConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.method == AuthMethod::Password && self.users.is_empty() {
            return Err("Password authentication enabled but no users configured".to_string());
        }
        Ok(())
    }
}

/// Default handshake timeout in seconds
fn default_handshake_secs() -> u64 {
    10
}

/// Default connect timeout in seconds
fn default_connect_secs() -> u64 {
    10
}

/// Default relay idle timeout in seconds
fn default_idle_secs() -> u64 {
    5
}

/// Per-phase deadlines, in seconds
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Deadline for method negotiation, and separately for the request
    #[serde(default = "default_handshake_secs")]
    pub handshake_secs: u64,

    /// Deadline for dialing the destination
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,

    /// How long the remaining relay direction may run after the other closes
    #[serde(default = "default_idle_secs")]
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            handshake_secs: default_handshake_secs(),
            connect_secs: default_connect_secs(),
            idle_secs: default_idle_secs(),
        }
    }
}

impl TimeoutConfig {
    /// Handshake deadline
    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }

    /// Dial deadline
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    /// Relay idle deadline
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.handshake_secs == 0 || self.connect_secs == 0 || self.idle_secs == 0 {
            return Err("Timeouts must be greater than zero".to_string());
        }
        Ok(())
    }
}
