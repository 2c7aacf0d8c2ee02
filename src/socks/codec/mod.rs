//! SOCKS5 wire message codec
//!
//! Every message the server reads or writes has a typed representation with
//! `read_from` (decode from an async reader), `to_bytes` (exact wire image)
//! and `write_to` (encode and flush). Short reads surface as
//! [`Socks5Error::Decode`] carrying the original I/O error; the codec applies
//! no timeouts of its own.

mod auth;
mod request;

pub use auth::{ClientHello, MethodSelection, PasswordReply, PasswordRequest};
pub use request::{ConnectionReply, ConnectionRequest};

use crate::error::Socks5Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read a single byte
async fn read_u8<R>(reader: &mut R, field: &'static str) -> Result<u8, Socks5Error>
where
    R: AsyncRead + Unpin,
{
    reader
        .read_u8()
        .await
        .map_err(|source| Socks5Error::Decode { field, source })
}

/// Read a big-endian port number
async fn read_port<R>(reader: &mut R) -> Result<u16, Socks5Error>
where
    R: AsyncRead + Unpin,
{
    reader
        .read_u16()
        .await
        .map_err(|source| Socks5Error::Decode {
            field: "port",
            source,
        })
}

/// Read exactly `len` bytes
async fn read_bytes<R>(
    reader: &mut R,
    len: usize,
    field: &'static str,
) -> Result<Vec<u8>, Socks5Error>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|source| Socks5Error::Decode { field, source })?;
    Ok(buf)
}

/// Read a one-byte length prefix followed by that many bytes.
///
/// Invalid UTF-8 is replaced with U+FFFD rather than rejected.
async fn read_string<R>(reader: &mut R, field: &'static str) -> Result<String, Socks5Error>
where
    R: AsyncRead + Unpin,
{
    let len = read_u8(reader, field).await? as usize;
    let bytes = read_bytes(reader, len, field).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Fail when `len` does not fit a one-byte length prefix
fn length_prefix(field: &'static str, len: usize) -> Result<u8, Socks5Error> {
    u8::try_from(len)
        .map_err(|_| Socks5Error::Malformed(format!("{} is {} bytes, at most 255", field, len)))
}

/// Write an encoded message and flush it
async fn write_message<W>(writer: &mut W, bytes: &[u8]) -> Result<(), Socks5Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}
