//! Connection request and reply messages

use super::{length_prefix, read_bytes, read_port, read_u8, write_message};
use crate::error::{Socks5Error, Socks5ReplyCode};
use crate::socks::consts::*;
use crate::socks::types::{SocksCommand, TargetAddr};
use bytes::{BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// Client request
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    /// Requested command
    pub command: SocksCommand,
    /// Destination address and port
    pub target: TargetAddr,
}

impl ConnectionRequest {
    /// Create a request
    pub fn new(command: SocksCommand, target: TargetAddr) -> Self {
        ConnectionRequest { command, target }
    }

    /// Decode a request.
    ///
    /// Unknown command bytes decode successfully as [`SocksCommand::Unknown`]
    /// so the caller can answer them; an unknown address type cannot be
    /// parsed past and fails with [`Socks5Error::AddressTypeNotSupported`].
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, Socks5Error>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; 4];
        reader
            .read_exact(&mut header)
            .await
            .map_err(|source| Socks5Error::Decode {
                field: "request header",
                source,
            })?;

        let [version, cmd_byte, reserved, addr_type] = header;

        if version != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(version));
        }
        if reserved != SOCKS5_RESERVED {
            return Err(Socks5Error::InvalidReserved(reserved));
        }

        let command = SocksCommand::from_byte(cmd_byte);
        let target = read_target(reader, addr_type).await?;

        Ok(ConnectionRequest { command, target })
    }

    /// Wire image; fails when a domain is longer than 255 bytes
    pub fn to_bytes(&self) -> Result<Bytes, Socks5Error> {
        let mut buf = BytesMut::with_capacity(22);
        buf.put_u8(SOCKS5_VERSION);
        buf.put_u8(self.command.to_byte());
        buf.put_u8(SOCKS5_RESERVED);
        put_target(&mut buf, &self.target)?;
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

/// Append `ATYP`, `DST.ADDR` and `DST.PORT`
fn put_target(buf: &mut BytesMut, target: &TargetAddr) -> Result<(), Socks5Error> {
    buf.put_u8(target.addr_type());
    match target {
        TargetAddr::Ip(SocketAddr::V4(addr)) => buf.put_slice(&addr.ip().octets()),
        TargetAddr::Ip(SocketAddr::V6(addr)) => buf.put_slice(&addr.ip().octets()),
        TargetAddr::Domain(domain, _) => {
            buf.put_u8(length_prefix("domain", domain.len())?);
            buf.put_slice(domain.as_bytes());
        }
    }
    buf.put_u16(target.port());
    Ok(())
}

/// Read `DST.ADDR` and `DST.PORT` for the given address type
async fn read_target<R>(reader: &mut R, addr_type: u8) -> Result<TargetAddr, Socks5Error>
where
    R: AsyncRead + Unpin,
{
    match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut addr = [0u8; 4];
            reader
                .read_exact(&mut addr)
                .await
                .map_err(|source| Socks5Error::Decode {
                    field: "IPv4 address",
                    source,
                })?;
            let port = read_port(reader).await?;
            Ok(TargetAddr::ipv4(Ipv4Addr::from(addr), port))
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            let len = read_u8(reader, "domain length").await? as usize;
            let domain = read_bytes(reader, len, "domain").await?;
            let port = read_port(reader).await?;
            if domain.is_empty() {
                return Err(Socks5Error::InvalidAddress("empty domain name".to_string()));
            }
            let domain = String::from_utf8(domain).map_err(|_| {
                Socks5Error::InvalidAddress("domain is not valid UTF-8".to_string())
            })?;
            Ok(TargetAddr::domain(domain, port))
        }

        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut addr = [0u8; 16];
            reader
                .read_exact(&mut addr)
                .await
                .map_err(|source| Socks5Error::Decode {
                    field: "IPv6 address",
                    source,
                })?;
            let port = read_port(reader).await?;
            Ok(TargetAddr::ipv6(Ipv6Addr::from(addr), port))
        }

        other => Err(Socks5Error::AddressTypeNotSupported(other)),
    }
}

/// Server reply to a request
///
/// The bound address is always reported as IPv4.
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' | X'01'|    4     |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionReply {
    /// Outcome of the request
    pub reply: Socks5ReplyCode,
    /// Bound address of the outbound connection
    pub bind_addr: SocketAddrV4,
}

impl ConnectionReply {
    /// Success reply carrying the local endpoint of the outbound connection
    pub fn success(bind_addr: SocketAddr) -> Self {
        ConnectionReply {
            reply: Socks5ReplyCode::Succeeded,
            bind_addr: bound_ipv4(bind_addr),
        }
    }

    /// Failure reply with an unspecified bound address
    pub fn failure(reply: Socks5ReplyCode) -> Self {
        ConnectionReply {
            reply,
            bind_addr: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
        }
    }

    /// Decode a reply
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, Socks5Error>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; 4];
        reader
            .read_exact(&mut header)
            .await
            .map_err(|source| Socks5Error::Decode {
                field: "reply header",
                source,
            })?;

        let [version, rep, reserved, addr_type] = header;

        if version != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(version));
        }
        if reserved != SOCKS5_RESERVED {
            return Err(Socks5Error::InvalidReserved(reserved));
        }
        if addr_type != SOCKS5_ADDR_TYPE_IPV4 {
            return Err(Socks5Error::AddressTypeNotSupported(addr_type));
        }

        let reply = Socks5ReplyCode::try_from(rep)?;
        let mut addr = [0u8; 4];
        reader
            .read_exact(&mut addr)
            .await
            .map_err(|source| Socks5Error::Decode {
                field: "bound address",
                source,
            })?;
        let port = read_port(reader).await?;

        Ok(ConnectionReply {
            reply,
            bind_addr: SocketAddrV4::new(Ipv4Addr::from(addr), port),
        })
    }

    /// Wire image
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(10);
        buf.put_u8(SOCKS5_VERSION);
        buf.put_u8(self.reply.into());
        buf.put_u8(SOCKS5_RESERVED);
        buf.put_u8(SOCKS5_ADDR_TYPE_IPV4);
        buf.put_slice(&self.bind_addr.ip().octets());
        buf.put_u16(self.bind_addr.port());
        buf.freeze()
    }

    /// Encode and flush
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), Socks5Error>
    where
        W: AsyncWrite + Unpin,
    {
        write_message(writer, &self.to_bytes()).await
    }
}

/// Project a local endpoint onto IPv4 for the reply.
///
/// IPv4-mapped IPv6 addresses are unwrapped; any other IPv6 address becomes
/// `0.0.0.0` with the real port.
fn bound_ipv4(addr: SocketAddr) -> SocketAddrV4 {
    match addr {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(v6) => {
            let ip = v6.ip().to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED);
            SocketAddrV4::new(ip, v6.port())
        }
    }
}
