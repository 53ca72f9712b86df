use std::net::SocketAddr;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};

use super::{assert_error, test_config, Client, TestServer};

/// Pings without panicking when the server has already closed the socket.
async fn try_ping(addr: SocketAddr) -> Option<Value> {
    let mut client = Client::connect(addr).await;
    client.writer.write_all(b"PING\n").await.ok()?;
    let mut line = String::new();
    client.reader.read_line(&mut line).await.ok()?;
    serde_json::from_str(&line).ok()
}

#[tokio::test]
async fn oversized_line_is_rejected_and_connection_closed() {
    let mut config = test_config();
    config.max_line_bytes = 64;
    let server = TestServer::start(config).await;

    let mut client = Client::connect(server.addr).await;
    let line = format!("INSERT s {}", "1,".repeat(100));
    assert_error(&client.send(&line).await, "LineTooLong");

    let mut rest = Vec::new();
    let closed = client.reader.read_to_end(&mut rest).await;
    assert!(matches!(closed, Ok(0) | Err(_)), "connection must be closed");

    let mut fresh = Client::connect(server.addr).await;
    assert_eq!(fresh.send("PING").await["status"], "Pong");

    server.stop().await;
}

#[tokio::test]
async fn line_at_the_limit_is_accepted() {
    let mut config = test_config();
    config.max_line_bytes = 16;
    let server = TestServer::start(config).await;
    let mut client = Client::connect(server.addr).await;

    let line = "CREATE abcdefg 1";
    assert_eq!(line.len(), 16);
    assert_eq!(client.send(line).await["status"], "Success");

    server.stop().await;
}

#[tokio::test]
async fn crlf_line_at_the_limit_is_accepted() {
    let mut config = test_config();
    config.max_line_bytes = 16;
    let server = TestServer::start(config).await;
    let mut client = Client::connect(server.addr).await;

    client
        .writer
        .write_all(b"CREATE abcdefg 1\r\n")
        .await
        .expect("request must be written");
    assert_eq!(client.read_response().await["status"], "Success");

    let mut client = Client::connect(server.addr).await;
    client
        .writer
        .write_all(b"CREATE abcdefgh 1\r\n")
        .await
        .expect("request must be written");
    assert_error(&client.read_response().await, "LineTooLong");

    server.stop().await;
}

#[tokio::test]
async fn blank_lines_get_no_response() {
    let server = TestServer::start(test_config()).await;
    let mut client = Client::connect(server.addr).await;

    client
        .writer
        .write_all(b"\n   \r\nPING\n")
        .await
        .expect("request must be written");
    assert_eq!(client.read_response().await["status"], "Pong");

    server.stop().await;
}

#[tokio::test]
async fn invalid_utf8_is_an_argument_error() {
    let server = TestServer::start(test_config()).await;
    let mut client = Client::connect(server.addr).await;

    client
        .writer
        .write_all(b"PING \xff\xfe\n")
        .await
        .expect("request must be written");
    assert_error(&client.read_response().await, "InvalidArgument");
    assert_eq!(client.send("PING").await["status"], "Pong");

    server.stop().await;
}

#[tokio::test]
async fn connections_over_the_limit_are_refused() {
    let mut config = test_config();
    config.max_connections = 1;
    let server = TestServer::start(config).await;

    let mut held = Client::connect(server.addr).await;
    assert_eq!(held.send("PING").await["status"], "Pong");

    let mut refused = Client::connect(server.addr).await;
    assert_error(&refused.read_response().await, "TooManyConnections");

    drop(held);
    let mut admitted = false;
    for _ in 0..50 {
        if try_ping(server.addr)
            .await
            .is_some_and(|response| response["status"] == "Pong")
        {
            admitted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(admitted, "slot must free up after the first client leaves");

    server.stop().await;
}
