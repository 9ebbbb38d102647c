use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use crate::common::{TestServer, connect, init_test_logging, request, session_token};

#[tokio::test]
async fn test_silent_client_is_disconnected() {
    init_test_logging();
    crate::test_log!("TEST START: test_silent_client_is_disconnected");

    let server = TestServer::start_with(|c| c.heartbeat_interval = Duration::from_millis(200)).await;
    let mut ws = connect(&server.ws_url(Some(&session_token()))).await;

    // Never poll the socket, so pings go unanswered.
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "connection should have been terminated");

    crate::test_log!("TEST PASS: test_silent_client_is_disconnected");
}

#[tokio::test]
async fn test_responsive_client_survives_several_intervals() {
    init_test_logging();
    let server = TestServer::start_with(|c| c.heartbeat_interval = Duration::from_millis(200)).await;
    let mut ws = connect(&server.ws_url(Some(&session_token()))).await;

    // Keep reading so the client answers each ping with a pong.
    let _ = tokio::time::timeout(Duration::from_millis(1000), async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;

    let resp = request(&mut ws, json!({"action": "ping"})).await;
    assert_eq!(resp["action"], "pong");
}

#[tokio::test]
async fn test_client_that_stops_reading_is_disconnected() {
    use futures::SinkExt;

    init_test_logging();
    crate::test_log!("TEST START: test_client_that_stops_reading_is_disconnected");

    let server = TestServer::start_with(|c| c.heartbeat_interval = Duration::from_millis(200)).await;
    std::fs::write(server.root().join("big.txt"), "x".repeat(256 * 1024)).unwrap();
    let health_url = format!("http://{}/health", server.addr);

    let mut ws = connect(&server.ws_url(Some(&session_token()))).await;
    // Queue far more replies than the socket and outbound queue can hold,
    // then never read them.
    let read = Message::Text(json!({"action": "read", "path": "big.txt"}).to_string().into());
    for _ in 0..200 {
        ws.send(read.clone()).await.unwrap();
    }

    let mut connections = 1;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        connections = fetch_health(&health_url).await["connections"].as_u64().unwrap();
        if connections == 0 {
            break;
        }
    }
    assert_eq!(connections, 0, "stalled connection should have been terminated");
    drop(ws);

    crate::test_log!("TEST PASS: test_client_that_stops_reading_is_disconnected");
}

#[tokio::test]
async fn test_health_counts_connections() {
    init_test_logging();
    let server = TestServer::start().await;
    let health_url = format!("http://{}/health", server.addr);

    let before = fetch_health(&health_url).await;
    assert_eq!(before["status"], "healthy");
    assert_eq!(before["connections"], 0);

    let mut ws = connect(&server.ws_url(Some(&session_token()))).await;
    let _ = request(&mut ws, json!({"action": "ping"})).await;
    let during = fetch_health(&health_url).await;
    assert_eq!(during["connections"], 1);
}

/// Minimal HTTP/1.1 GET over a raw socket.
async fn fetch_health(url: &str) -> serde_json::Value {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let authority = url
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap()
        .to_string();
    let mut stream = tokio::net::TcpStream::connect(&authority).await.unwrap();
    let req = format!("GET /health HTTP/1.1\r\nHost: {authority}\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    let body = raw.split("\r\n\r\n").nth(1).unwrap();
    serde_json::from_str(body).unwrap()
}
