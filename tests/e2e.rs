//! End-to-end tests over real TCP sockets

mod common;

use common::*;
use socksd::socks::{AuthPolicy, StaticCredentials, VerifyFn, SOCKS5_CMD_TCP_BIND};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn password_policy() -> AuthPolicy {
    let mut users = HashMap::new();
    users.insert("admin".to_string(), "123456".to_string());
    AuthPolicy::password(StaticCredentials::new(users))
}

#[tokio::test]
async fn test_connect_and_echo_no_auth() {
    let (echo_addr, echo_closed) = start_echo_server().await;
    let proxy = start_proxy(test_server_config(), AuthPolicy::no_auth()).await;

    let mut client = connect_no_auth(proxy.addr).await;
    let reply = send_request(
        &mut client,
        &socks5_mock::create_connect_ipv4([127, 0, 0, 1], echo_addr.port()),
    )
    .await;
    assert_eq!(&reply[..4], &[0x05, 0x00, 0x00, 0x01]);
    assert_eq!(&reply[4..8], &[127, 0, 0, 1]);
    assert_ne!(u16::from_be_bytes([reply[8], reply[9]]), 0);

    client.write_all(b"hello through the proxy").await.unwrap();
    let mut buf = [0u8; 23];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello through the proxy");

    // Closing the client side propagates to the destination
    client.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), echo_closed)
        .await
        .expect("destination was not closed")
        .unwrap();

    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    let _ = proxy.shutdown_tx.send(true);
}

#[tokio::test]
async fn test_connect_domain() {
    let (echo_addr, _echo_closed) = start_echo_server().await;
    let proxy = start_proxy(test_server_config(), AuthPolicy::no_auth()).await;

    let mut client = connect_no_auth(proxy.addr).await;
    let reply = send_request(
        &mut client,
        &socks5_mock::create_connect_domain("localhost", echo_addr.port()),
    )
    .await;
    assert_eq!(reply[1], 0x00);
    assert_eq!(reply[3], 0x01);

    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
}

#[tokio::test]
async fn test_password_auth_success() {
    let (echo_addr, _echo_closed) = start_echo_server().await;
    let proxy = start_proxy(test_server_config(), password_policy()).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    client
        .write_all(&socks5_mock::create_auth_request_password())
        .await
        .unwrap();
    let mut selection = [0u8; 2];
    client.read_exact(&mut selection).await.unwrap();
    assert_eq!(selection, [0x05, 0x02]);

    client
        .write_all(&socks5_mock::create_password_request("admin", "123456"))
        .await
        .unwrap();
    let mut status = [0u8; 2];
    client.read_exact(&mut status).await.unwrap();
    assert_eq!(status, [0x01, 0x00]);

    let reply = send_request(
        &mut client,
        &socks5_mock::create_connect_ipv4([127, 0, 0, 1], echo_addr.port()),
    )
    .await;
    assert_eq!(reply[1], 0x00);
}

#[tokio::test]
async fn test_password_auth_failure_closes_connection() {
    let proxy = start_proxy(test_server_config(), password_policy()).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    let mut input = socks5_mock::create_auth_request_password();
    input.extend_from_slice(&socks5_mock::create_password_request("admin", "wrong"));
    client.write_all(&input).await.unwrap();

    let mut output = Vec::new();
    client.read_to_end(&mut output).await.unwrap();
    assert_eq!(output, [0x05, 0x02, 0x01, 0x01]);
}

#[tokio::test]
async fn test_custom_verifier() {
    let policy = AuthPolicy::password(VerifyFn(|user: &str, pass: &str| user == pass));
    let proxy = start_proxy(test_server_config(), policy).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    let mut input = socks5_mock::create_auth_request_password();
    input.extend_from_slice(&socks5_mock::create_password_request("same", "same"));
    client.write_all(&input).await.unwrap();

    let mut output = [0u8; 4];
    client.read_exact(&mut output).await.unwrap();
    assert_eq!(output, [0x05, 0x02, 0x01, 0x00]);
}

#[tokio::test]
async fn test_no_acceptable_method() {
    let proxy = start_proxy(test_server_config(), password_policy()).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    client
        .write_all(&socks5_mock::create_auth_request_no_auth())
        .await
        .unwrap();

    let mut output = Vec::new();
    client.read_to_end(&mut output).await.unwrap();
    assert_eq!(output, [0x05, 0xFF]);
}

#[tokio::test]
async fn test_bind_command_not_supported() {
    let proxy = start_proxy(test_server_config(), AuthPolicy::no_auth()).await;

    let mut client = connect_no_auth(proxy.addr).await;
    let reply = send_request(
        &mut client,
        &socks5_mock::create_request_ipv4(SOCKS5_CMD_TCP_BIND, [127, 0, 0, 1], 80),
    )
    .await;
    assert_eq!(reply, [0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
}

#[tokio::test]
async fn test_ipv6_address_type_not_supported() {
    let proxy = start_proxy(test_server_config(), AuthPolicy::no_auth()).await;

    let mut client = connect_no_auth(proxy.addr).await;
    let mut ip = [0u8; 16];
    ip[15] = 1;
    let reply = send_request(&mut client, &socks5_mock::create_connect_ipv6(ip, 80)).await;
    assert_eq!(reply[1], 0x08);
}

#[tokio::test]
async fn test_empty_domain_general_failure() {
    let proxy = start_proxy(test_server_config(), AuthPolicy::no_auth()).await;

    let mut client = connect_no_auth(proxy.addr).await;
    let reply = send_request(&mut client, &socks5_mock::create_connect_domain("", 80)).await;
    assert_eq!(reply, [0x05, 0x01, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);

    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_connection_refused() {
    let target = closed_port_addr().await;
    let proxy = start_proxy(test_server_config(), AuthPolicy::no_auth()).await;

    let mut client = connect_no_auth(proxy.addr).await;
    let reply = send_request(
        &mut client,
        &socks5_mock::create_connect_ipv4([127, 0, 0, 1], target.port()),
    )
    .await;
    assert_eq!(reply[1], 0x05);

    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_silent_client_dropped_after_handshake_timeout() {
    let mut config = test_server_config();
    config.timeouts.handshake_secs = 1;
    let proxy = start_proxy(config, AuthPolicy::no_auth()).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(3), client.read(&mut buf))
        .await
        .expect("proxy kept a silent client open");
    assert!(matches!(read, Ok(0) | Err(_)));
}

#[tokio::test]
async fn test_max_connections() {
    let mut config = test_server_config();
    config.max_connections = 1;
    let proxy = start_proxy(config, AuthPolicy::no_auth()).await;

    // Holds the only slot
    let _first = connect_no_auth(proxy.addr).await;

    let mut second = TcpStream::connect(proxy.addr).await.unwrap();
    let _ = second
        .write_all(&socks5_mock::create_auth_request_no_auth())
        .await;
    let mut output = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(2), second.read_to_end(&mut output))
        .await
        .expect("over-limit connection was not closed");
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let proxy = start_proxy(test_server_config(), AuthPolicy::no_auth()).await;

    proxy.shutdown_tx.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), proxy.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());

    assert!(TcpStream::connect(proxy.addr).await.is_err());
}
