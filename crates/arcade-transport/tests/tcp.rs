//! Integration tests for the TCP transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a plain `TcpStream` using the public framing helpers.

use arcade_transport::{
    read_frame, write_frame, Connection, TcpTransport, Transport,
    TransportError, DEFAULT_MAX_FRAME_LEN,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[tokio::test]
async fn test_tcp_accept_and_exchange_frames() {
    let mut transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr");

    let server = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });

    let mut client = TcpStream::connect(addr).await.expect("connect");
    let conn = server.await.expect("task should complete");

    assert_eq!(conn.peer_addr(), client.local_addr().unwrap());
    assert!(conn.id().into_inner() > 0);

    // Client → server.
    write_frame(&mut client, br#"{"cmd":"list_rooms"}"#, DEFAULT_MAX_FRAME_LEN)
        .await
        .unwrap();
    let received = conn.recv().await.unwrap().expect("a frame");
    assert_eq!(received, br#"{"cmd":"list_rooms"}"#);

    // Server → client.
    conn.send(b"pong").await.unwrap();
    let reply = read_frame(&mut client, DEFAULT_MAX_FRAME_LEN)
        .await
        .unwrap()
        .expect("a frame");
    assert_eq!(reply, b"pong");
}

#[tokio::test]
async fn test_tcp_clean_close_returns_none() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });

    let client = TcpStream::connect(addr).await.unwrap();
    let conn = server.await.unwrap();
    drop(client);

    assert!(conn.recv().await.unwrap().is_none());
}

#[tokio::test]
async fn test_tcp_oversized_frame_is_a_protocol_violation() {
    let mut transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .unwrap()
        .with_max_frame_len(64);
    let addr = transport.local_addr().unwrap();
    let server = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut client = TcpStream::connect(addr).await.unwrap();
    let conn = server.await.unwrap();
    client.write_all(&1_000_000u32.to_be_bytes()).await.unwrap();

    let result = conn.recv().await;
    assert!(matches!(
        result,
        Err(TransportError::FrameTooLarge { len: 1_000_000, max: 64 })
    ));
}
