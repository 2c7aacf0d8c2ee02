//! Method negotiation and username/password sub-negotiation messages

use super::{length_prefix, read_bytes, read_string, read_u8, write_message};
use crate::error::Socks5Error;
use crate::socks::consts::*;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};

/// Client greeting listing the authentication methods it supports
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Offered method codes, in client order (at most 255)
    pub methods: Vec<u8>,
}

impl ClientHello {
    /// Create a hello offering the given method codes
    pub fn new(methods: Vec<u8>) -> Self {
        ClientHello { methods }
    }

    /// Decode a hello.
    ///
    /// The version is checked as soon as it is read, before the method list.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, Socks5Error>
    where
        R: AsyncRead + Unpin,
    {
        let version = read_u8(reader, "version").await?;
        if version != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(version));
        }

        let nmethods = read_u8(reader, "method count").await? as usize;
        let methods = read_bytes(reader, nmethods, "methods").await?;

        Ok(ClientHello { methods })
    }

    /// Whether the client offered `method`
    pub fn offers(&self, method: u8) -> bool {
        self.methods.contains(&method)
    }

    /// Wire image; fails when more than 255 methods are listed
    pub fn to_bytes(&self) -> Result<Bytes, Socks5Error> {
        let nmethods = length_prefix("methods", self.methods.len())?;
        let mut buf = BytesMut::with_capacity(2 + self.methods.len());
        buf.put_u8(SOCKS5_VERSION);
        buf.put_u8(nmethods);
        buf.put_slice(&self.methods);
        Ok(buf.freeze())
    }

    /// Encode and flush
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), Socks5Error>
    where
        W: AsyncWrite + Unpin,
    {
        write_message(writer, &self.to_bytes()?).await
    }
}

/// Server's method choice
///
/// ```text
/// +----+--------+
/// |VER | METHOD |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSelection {
    /// Selected method code, `0xFF` when nothing was acceptable
    pub method: u8,
}

impl MethodSelection {
    /// Select `method`
    pub fn new(method: u8) -> Self {
        MethodSelection { method }
    }

    /// The "no acceptable methods" answer
    pub fn not_acceptable() -> Self {
        MethodSelection {
            method: SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE,
        }
    }

    /// Whether this is the "no acceptable methods" answer
    pub fn is_not_acceptable(&self) -> bool {
        self.method == SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE
    }

    /// Decode a method selection
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, Socks5Error>
    where
        R: AsyncRead + Unpin,
    {
        let version = read_u8(reader, "version").await?;
        if version != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(version));
        }
        let method = read_u8(reader, "method").await?;
        Ok(MethodSelection { method })
    }

    /// Wire image
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&[SOCKS5_VERSION, self.method])
    }

    /// Encode and flush
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), Socks5Error>
    where
        W: AsyncWrite + Unpin,
    {
        write_message(writer, &self.to_bytes()).await
    }
}

/// RFC 1929 username/password request
///
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 0 to 255 |  1   | 0 to 255 |
/// +----+------+----------+------+----------+
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordRequest {
    /// Username (at most 255 bytes)
    pub username: String,
    /// Password (at most 255 bytes)
    pub password: String,
}

impl std::fmt::Debug for PasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl PasswordRequest {
    /// Create a request
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        PasswordRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode a request
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, Socks5Error>
    where
        R: AsyncRead + Unpin,
    {
        let version = read_u8(reader, "sub-negotiation version").await?;
        if version != SOCKS5_AUTH_VERSION {
            return Err(Socks5Error::UnsupportedAuthVersion(version));
        }

        let username = read_string(reader, "username").await?;
        let password = read_string(reader, "password").await?;

        Ok(PasswordRequest { username, password })
    }

    /// Wire image; fails when either field is longer than 255 bytes
    pub fn to_bytes(&self) -> Result<Bytes, Socks5Error> {
        let ulen = length_prefix("username", self.username.len())?;
        let plen = length_prefix("password", self.password.len())?;
        let mut buf = BytesMut::with_capacity(3 + self.username.len() + self.password.len());
        buf.put_u8(SOCKS5_AUTH_VERSION);
        buf.put_u8(ulen);
        buf.put_slice(self.username.as_bytes());
        buf.put_u8(plen);
        buf.put_slice(self.password.as_bytes());
        Ok(buf.freeze())
    }

    /// Encode and flush
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), Socks5Error>
    where
        W: AsyncWrite + Unpin,
    {
        write_message(writer, &self.to_bytes()?).await
    }
}

/// RFC 1929 sub-negotiation verdict
///
/// ```text
/// +----+--------+
/// |VER | STATUS |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordReply {
    /// Whether the credentials were accepted
    pub success: bool,
}

impl PasswordReply {
    /// Accepted
    pub fn success() -> Self {
        PasswordReply { success: true }
    }

    /// Rejected
    pub fn failure() -> Self {
        PasswordReply { success: false }
    }

    /// Decode a reply; any nonzero status is a failure
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, Socks5Error>
    where
        R: AsyncRead + Unpin,
    {
        let version = read_u8(reader, "sub-negotiation version").await?;
        if version != SOCKS5_AUTH_VERSION {
            return Err(Socks5Error::UnsupportedAuthVersion(version));
        }
        let status = read_u8(reader, "status").await?;
        Ok(PasswordReply {
            success: status == SOCKS5_AUTH_SUCCESS,
        })
    }

    /// Wire image
    pub fn to_bytes(&self) -> Bytes {
        let status = if self.success {
            SOCKS5_AUTH_SUCCESS
        } else {
            SOCKS5_AUTH_FAILURE
        };
        Bytes::copy_from_slice(&[SOCKS5_AUTH_VERSION, status])
    }

    /// Encode and flush
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), Socks5Error>
    where
        W: AsyncWrite + Unpin,
    {
        write_message(writer, &self.to_bytes()).await
    }
}
