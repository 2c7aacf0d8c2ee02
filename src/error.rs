//! Error types for Socksd
//!
//! This module defines all custom error types used throughout the application.

use std::io;
use thiserror::Error;

/// Main error type for Socksd operations
#[derive(Error, Debug)]
pub enum SocksdError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SOCKS5 protocol error
    #[error("SOCKS5 error: {0}")]
    Socks5(#[from] Socks5Error),
}

/// SOCKS5 session errors
///
/// Every variant is terminal for the session that produced it.
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// The stream ended or failed while a message field was being read
    #[error("Failed to decode {field}: {source}")]
    Decode {
        /// Name of the field being read
        field: &'static str,
        /// Underlying read error
        #[source]
        source: io::Error,
    },

    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Unsupported username/password sub-negotiation version
    #[error("Unsupported sub-negotiation version: {0}")]
    UnsupportedAuthVersion(u8),

    /// Reserved byte was not zero
    #[error("Invalid reserved field: {0}")]
    InvalidReserved(u8),

    /// Structurally invalid message content
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// No acceptable authentication method
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Authentication failed
    #[error("Authentication failed for user: {0}")]
    AuthFailed(String),

    /// Command not supported
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    AddressTypeNotSupported(u8),

    /// Destination address that parses but cannot be used
    #[error("Invalid destination address: {0}")]
    InvalidAddress(String),

    /// Destination could not be reached
    #[error("Failed to connect to {target}: {source}")]
    DialFailed {
        /// Requested destination
        target: String,
        /// Underlying dial error
        #[source]
        source: io::Error,
    },

    /// Relay I/O failure
    #[error("Relay failed: {0}")]
    Relay(#[source] io::Error),

    /// A session phase ran past its deadline
    #[error("Timeout during {0}")]
    Timeout(&'static str),

    /// IO error while writing a message
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Socks5Error {
    /// Reply code reported to the client for this failure, if the request
    /// phase defines one.
    pub fn reply_code(&self) -> Option<Socks5ReplyCode> {
        match self {
            Socks5Error::CommandNotSupported(_) => Some(Socks5ReplyCode::CommandNotSupported),
            Socks5Error::AddressTypeNotSupported(_) => {
                Some(Socks5ReplyCode::AddressTypeNotSupported)
            }
            Socks5Error::InvalidAddress(_) => Some(Socks5ReplyCode::GeneralFailure),
            Socks5Error::DialFailed { .. } => Some(Socks5ReplyCode::ConnectionRefused),
            _ => None,
        }
    }

    /// Whether the error only means the client went away mid-message
    pub fn is_eof(&self) -> bool {
        matches!(
            self,
            Socks5Error::Decode { source, .. } if source.kind() == io::ErrorKind::UnexpectedEof
        )
    }
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for Socks5ReplyCode {
    type Error = Socks5Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Socks5ReplyCode::Succeeded),
            0x01 => Ok(Socks5ReplyCode::GeneralFailure),
            0x02 => Ok(Socks5ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(Socks5ReplyCode::NetworkUnreachable),
            0x04 => Ok(Socks5ReplyCode::HostUnreachable),
            0x05 => Ok(Socks5ReplyCode::ConnectionRefused),
            0x06 => Ok(Socks5ReplyCode::TtlExpired),
            0x07 => Ok(Socks5ReplyCode::CommandNotSupported),
            0x08 => Ok(Socks5ReplyCode::AddressTypeNotSupported),
            other => Err(Socks5Error::Malformed(format!("unknown reply code {}", other))),
        }
    }
}
