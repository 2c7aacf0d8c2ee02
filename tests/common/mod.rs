//! Test utilities for Socksd
//!
//! This module provides common helpers used across integration tests.

#![allow(dead_code)]

use socksd::config::ServerConfig;
use socksd::server::Server;
use socksd::socks::AuthPolicy;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start a TCP echo server accepting a single connection
///
/// The returned receiver fires once the echo side has seen EOF from the
/// proxy and closed its socket.
pub async fn start_echo_server() -> (SocketAddr, oneshot::Receiver<()>) {
    let (listener, addr) = create_test_listener().await;
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if stream.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
        drop(stream);
        let _ = closed_tx.send(());
    });

    (addr, closed_rx)
}

/// Return a loopback address with nothing listening on it
pub async fn closed_port_addr() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    addr
}

/// A proxy running in the background
pub struct TestProxy {
    /// Address clients connect to
    pub addr: SocketAddr,
    /// Stops the accept loop when sent
    pub shutdown_tx: broadcast::Sender<bool>,
    /// The accept loop task
    pub handle: JoinHandle<anyhow::Result<()>>,
}

/// Default server configuration bound to an ephemeral port
pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        ..Default::default()
    }
}

/// Bind and run a proxy with the given configuration and policy
pub async fn start_proxy(config: ServerConfig, policy: AuthPolicy) -> TestProxy {
    let server = Server::bind(&config, policy).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(server.run(shutdown_rx));

    TestProxy {
        addr,
        shutdown_tx,
        handle,
    }
}

/// Connect to the proxy and complete a no-auth negotiation
pub async fn connect_no_auth(proxy: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream
        .write_all(&socks5_mock::create_auth_request_no_auth())
        .await
        .unwrap();
    let mut selection = [0u8; 2];
    stream.read_exact(&mut selection).await.unwrap();
    assert_eq!(selection, [0x05, 0x00]);
    stream
}

/// Send a request and read the 10-byte reply
pub async fn send_request(stream: &mut TcpStream, request: &[u8]) -> [u8; 10] {
    stream.write_all(request).await.unwrap();
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    reply
}

/// Mock SOCKS5 handshake data, encoded with the crate's own codec
pub mod socks5_mock {
    use socksd::socks::codec::{ClientHello, ConnectionRequest, PasswordRequest};
    use socksd::socks::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn hello(methods: Vec<u8>) -> Vec<u8> {
        ClientHello::new(methods).to_bytes().unwrap().to_vec()
    }

    fn request(command: SocksCommand, target: TargetAddr) -> Vec<u8> {
        ConnectionRequest::new(command, target)
            .to_bytes()
            .unwrap()
            .to_vec()
    }

    /// Create a no-auth method selection request
    pub fn create_auth_request_no_auth() -> Vec<u8> {
        hello(vec![SOCKS5_AUTH_METHOD_NONE])
    }

    /// Create a password auth method selection request
    pub fn create_auth_request_password() -> Vec<u8> {
        hello(vec![SOCKS5_AUTH_METHOD_PASSWORD])
    }

    /// Create a username/password sub-negotiation request
    pub fn create_password_request(username: &str, password: &str) -> Vec<u8> {
        PasswordRequest::new(username, password)
            .to_bytes()
            .unwrap()
            .to_vec()
    }

    /// Create a request with an arbitrary command to an IPv4 address
    pub fn create_request_ipv4(cmd: u8, ip: [u8; 4], port: u16) -> Vec<u8> {
        request(
            SocksCommand::from_byte(cmd),
            TargetAddr::ipv4(Ipv4Addr::from(ip), port),
        )
    }

    /// Create a connect command to IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        create_request_ipv4(SOCKS5_CMD_TCP_CONNECT, ip, port)
    }

    /// Create a connect command to domain
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        request(
            SocksCommand::Connect,
            TargetAddr::domain(domain.to_string(), port),
        )
    }

    /// Create a connect command to IPv6 address
    pub fn create_connect_ipv6(ip: [u8; 16], port: u16) -> Vec<u8> {
        request(
            SocksCommand::Connect,
            TargetAddr::ipv6(Ipv6Addr::from(ip), port),
        )
    }
}
