use std::time::Duration;

use futures::{SinkExt, StreamExt};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const PRIVATE_KEY: &str = include_str!("../fixtures/test_private.pem");
pub const OTHER_PRIVATE_KEY: &str = include_str!("../fixtures/other_private.pem");

const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Sign `claims` with RS256.
pub fn sign_token(claims: &Value, private_pem: &str) -> String {
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

/// A token for a typical editor session.
pub fn session_token() -> String {
    sign_token(
        &serde_json::json!({"userId": "u-1", "username": "ada", "repoName": "site"}),
        PRIVATE_KEY,
    )
}

pub async fn connect(url: &str) -> WsClient {
    let (ws, _response) = tokio_tungstenite::connect_async(url).await.unwrap();
    ws
}

/// Next text frame as JSON. Control frames are skipped.
pub async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(READ_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a reply")
            .expect("connection ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Send one request and wait for its reply.
pub async fn request(ws: &mut WsClient, body: Value) -> Value {
    ws.send(Message::Text(body.to_string().into())).await.unwrap();
    next_json(ws).await
}
