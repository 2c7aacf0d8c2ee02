//! SOCKS5 request dispatch
//!
//! Reads one connection request from an authenticated client, validates it,
//! dials the destination and answers with exactly one reply.

use crate::error::{Socks5Error, Socks5ReplyCode};
use crate::socks::codec::{ConnectionReply, ConnectionRequest};
use crate::socks::consts::SOCKS5_ADDR_TYPE_IPV6;
use crate::socks::types::{SocksCommand, TargetAddr};
use crate::transport::Dialer;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

/// Handle a single connection request
///
/// On success the success reply has already been written and the dialed
/// destination stream is returned together with the requested target.
/// On failure the matching failure reply has been written, unless the
/// request could not be decoded far enough to answer it.
/// `reply_timeout` bounds each reply write, not the dial.
///
/// | Condition                      | Reply |
/// |--------------------------------|-------|
/// | empty or non-UTF-8 domain      | 0x01  |
/// | dial error or dial timeout     | 0x05  |
/// | command other than CONNECT     | 0x07  |
/// | unknown or IPv6 address type   | 0x08  |
pub async fn handle_request<S, D>(
    stream: &mut S,
    dialer: &D,
    reply_timeout: Duration,
) -> Result<(D::Stream, TargetAddr), Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: Dialer,
{
    let request = read_request(stream).await?;
    dispatch(stream, request, dialer, reply_timeout).await
}

/// Decode a connection request
///
/// An unknown address type is answered with 0x08 here since the rest of
/// the request cannot be parsed. An unusable domain is answered with 0x01.
/// The caller bounds the whole call, failure reply included.
pub async fn read_request<S>(stream: &mut S) -> Result<ConnectionRequest, Socks5Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match ConnectionRequest::read_from(stream).await {
        Ok(request) => {
            debug!("SOCKS5 {} request to {}", request.command, request.target);
            Ok(request)
        }
        Err(e) => {
            if let Some(code) = e.reply_code() {
                let _ = ConnectionReply::failure(code).write_to(stream).await;
            }
            Err(e)
        }
    }
}

/// Validate a decoded request, dial its destination and send the reply.
///
/// The dial is bounded by the dialer itself; every reply write is bounded
/// by `reply_timeout`, and a stalled success reply fails with
/// [`Socks5Error::Timeout`].
pub async fn dispatch<S, D>(
    stream: &mut S,
    request: ConnectionRequest,
    dialer: &D,
    reply_timeout: Duration,
) -> Result<(D::Stream, TargetAddr), Socks5Error>
where
    S: AsyncWrite + Unpin,
    D: Dialer,
{
    if let Err(e) = validate(&request) {
        warn!("Rejecting {} request to {}: {}", request.command, request.target, e);
        if let Some(code) = e.reply_code() {
            send_failure(stream, code, reply_timeout).await;
        }
        return Err(e);
    }

    let (target_stream, local_addr) = match dialer.dial(&request.target).await {
        Ok(connected) => connected,
        Err(source) => {
            let err = Socks5Error::DialFailed {
                target: request.target.to_string(),
                source,
            };
            send_failure(stream, Socks5ReplyCode::ConnectionRefused, reply_timeout).await;
            return Err(err);
        }
    };

    send_reply(stream, ConnectionReply::success(local_addr), reply_timeout).await?;
    debug!("Connected to {} via {}", request.target, local_addr);

    Ok((target_stream, request.target))
}

/// Check the command and address type the server can serve
fn validate(request: &ConnectionRequest) -> Result<(), Socks5Error> {
    if request.command != SocksCommand::Connect {
        return Err(Socks5Error::CommandNotSupported(request.command.to_byte()));
    }
    if request.target.addr_type() == SOCKS5_ADDR_TYPE_IPV6 {
        return Err(Socks5Error::AddressTypeNotSupported(SOCKS5_ADDR_TYPE_IPV6));
    }
    Ok(())
}

/// Write a reply within `limit`
async fn send_reply<S>(
    stream: &mut S,
    reply: ConnectionReply,
    limit: Duration,
) -> Result<(), Socks5Error>
where
    S: AsyncWrite + Unpin,
{
    tokio::time::timeout(limit, reply.write_to(stream))
        .await
        .map_err(|_| Socks5Error::Timeout("reply"))?
}

/// Write a failure reply, ignoring write errors so the original error wins
async fn send_failure<S>(stream: &mut S, code: Socks5ReplyCode, limit: Duration)
where
    S: AsyncWrite + Unpin,
{
    let _ = send_reply(stream, ConnectionReply::failure(code), limit).await;
}
