//! TCP relay for SOCKS5 CONNECT
//!
//! Copies bytes between the client and the destination in both directions
//! until one side finishes, then gives the other side a bounded amount of
//! time to drain before both streams are dropped.

use crate::error::Socks5Error;
use crate::socks::consts::DEFAULT_BUFFER_SIZE;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Bytes moved in each direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes read from the client and written to the destination
    pub client_to_target: u64,
    /// Bytes read from the destination and written to the client
    pub target_to_client: u64,
}

/// Relay data bidirectionally between client and destination
///
/// When either direction completes, `idle` is armed as an absolute deadline
/// on the other one. Reaching that deadline ends the relay normally; an
/// I/O error in either direction fails it with [`Socks5Error::Relay`].
/// Both streams are dropped before this returns.
pub async fn relay_tcp<A, B>(
    client: A,
    target: B,
    idle: Duration,
) -> Result<RelayStats, Socks5Error>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut target_read, mut target_write) = tokio::io::split(target);

    let mut stats = RelayStats::default();

    {
        let upstream = copy_half(
            &mut client_read,
            &mut target_write,
            &mut stats.client_to_target,
        );
        let downstream = copy_half(
            &mut target_read,
            &mut client_write,
            &mut stats.target_to_client,
        );
        tokio::pin!(upstream);
        tokio::pin!(downstream);

        let (first, upstream_done) = tokio::select! {
            result = &mut upstream => (result, true),
            result = &mut downstream => (result, false),
        };

        if upstream_done {
            debug!("Client to target finished");
            first.map_err(Socks5Error::Relay)?;
            drain(downstream.as_mut(), idle, "target to client").await?;
        } else {
            debug!("Target to client finished");
            first.map_err(Socks5Error::Relay)?;
            drain(upstream.as_mut(), idle, "client to target").await?;
        }
    }

    debug!(
        "Relay finished: {} bytes up, {} bytes down",
        stats.client_to_target, stats.target_to_client
    );
    Ok(stats)
}

/// Let the remaining direction run until it finishes or `idle` elapses
async fn drain<F>(
    remaining: Pin<&mut F>,
    idle: Duration,
    direction: &str,
) -> Result<(), Socks5Error>
where
    F: Future<Output = io::Result<()>>,
{
    match tokio::time::timeout(idle, remaining).await {
        Ok(result) => result.map_err(Socks5Error::Relay),
        Err(_) => {
            debug!("{} idle for {:?}, closing", direction, idle);
            Ok(())
        }
    }
}

/// Copy one direction, then propagate EOF as a write shutdown.
///
/// `transferred` is updated after every write rather than returned, so the
/// count is kept when the idle deadline drops this future mid-copy.
async fn copy_half<R, W>(
    reader: &mut R,
    writer: &mut W,
    transferred: &mut u64,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        *transferred += n as u64;
    }

    // The peer may already be gone
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown after EOF failed: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_relay_tcp_echo() {
        let (mut client, client_side) = duplex(1024);
        let (target_side, mut target) = duplex(1024);

        let relay = tokio::spawn(async move {
            relay_tcp(client_side, target_side, Duration::from_secs(5)).await
        });

        client.write_all(b"hello from client").await.unwrap();
        let mut buf = [0u8; 17];
        target.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello from client");

        target.write_all(b"hello from target").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello from target");

        // Client closes; the destination sees EOF and closes too
        client.shutdown().await.unwrap();
        let mut rest = Vec::new();
        target.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
        drop(target);

        let stats = relay.await.unwrap().unwrap();
        assert_eq!(stats.client_to_target, 17);
        assert_eq!(stats.target_to_client, 17);
    }

    #[tokio::test]
    async fn test_relay_propagates_half_close() {
        let (mut client, client_side) = duplex(1024);
        let (target_side, mut target) = duplex(1024);

        let relay = tokio::spawn(async move {
            relay_tcp(client_side, target_side, Duration::from_secs(5)).await
        });

        // Destination answers and closes; the client still gets the bytes
        target.write_all(b"response").await.unwrap();
        target.shutdown().await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"response");

        // Client can still send within the idle window
        client.write_all(b"late").await.unwrap();
        let mut buf = [0u8; 4];
        target.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"late");

        client.shutdown().await.unwrap();
        let stats = relay.await.unwrap().unwrap();
        assert_eq!(stats.target_to_client, 8);
        assert_eq!(stats.client_to_target, 4);
    }

    #[tokio::test]
    async fn test_relay_idle_deadline_is_not_an_error() {
        let (client, client_side) = duplex(1024);
        let (target_side, _target) = duplex(1024);

        // Client goes away; the destination stays open but silent
        drop(client);

        let started = Instant::now();
        let stats = relay_tcp(client_side, target_side, Duration::from_millis(100))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(stats, RelayStats::default());
    }

    #[tokio::test]
    async fn test_relay_counts_bytes_of_direction_cut_by_deadline() {
        let (mut client, client_side) = duplex(1024);
        let (target_side, mut target) = duplex(1024);

        // The destination sends, then stays open and silent past the deadline
        target.write_all(b"partial").await.unwrap();
        client.shutdown().await.unwrap();

        let stats = relay_tcp(client_side, target_side, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(stats.client_to_target, 0);
        assert_eq!(stats.target_to_client, 7);

        let mut buf = [0u8; 7];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"partial");
        drop(target);
    }

    #[tokio::test]
    async fn test_relay_write_error_is_reported() {
        let (mut client, client_side) = duplex(1024);
        let (target_side, target) = duplex(1024);

        client.write_all(b"payload").await.unwrap();
        drop(target);

        let err = relay_tcp(client_side, target_side, Duration::from_secs(1))
            .await
            .unwrap_err();
        match err {
            Socks5Error::Relay(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
