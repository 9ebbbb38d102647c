use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use crate::common::{
    OTHER_PRIVATE_KEY, PRIVATE_KEY, TestServer, WsClient, connect, init_test_logging, request,
    session_token, sign_token,
};

/// Read until the server closes; return the close code and reason, failing if
/// any text frame arrives first.
async fn expect_policy_close(ws: &mut WsClient) -> (u16, String) {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended without a close frame")
            .expect("websocket error");
        match msg {
            Message::Close(Some(frame)) => {
                return (u16::from(frame.code), frame.reason.as_str().to_string());
            }
            Message::Text(text) => panic!("unauthenticated client received JSON: {text}"),
            Message::Close(None) => panic!("close frame without code"),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_missing_token_closes_with_policy_violation() {
    init_test_logging();
    crate::test_log!("TEST START: test_missing_token_closes_with_policy_violation");

    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url(None)).await;
    let (code, reason) = expect_policy_close(&mut ws).await;
    assert_eq!(code, 1008);
    assert_eq!(reason, "Unauthorized");

    crate::test_log!("TEST PASS: test_missing_token_closes_with_policy_violation");
}

#[tokio::test]
async fn test_token_from_wrong_key_is_rejected() {
    init_test_logging();
    crate::test_log!("TEST START: test_token_from_wrong_key_is_rejected");

    let server = TestServer::start().await;
    let token = sign_token(&json!({"userId": "u-1"}), OTHER_PRIVATE_KEY);
    let mut ws = connect(&server.ws_url(Some(&token))).await;
    let (code, _) = expect_policy_close(&mut ws).await;
    assert_eq!(code, 1008);

    crate::test_log!("TEST PASS: test_token_from_wrong_key_is_rejected");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    init_test_logging();
    let server = TestServer::start().await;
    let token = sign_token(&json!({"userId": "u-1", "exp": 1_000_000_000u64}), PRIVATE_KEY);
    let mut ws = connect(&server.ws_url(Some(&token))).await;
    let (code, _) = expect_policy_close(&mut ws).await;
    assert_eq!(code, 1008);
}

#[tokio::test]
async fn test_valid_token_gets_pong() {
    init_test_logging();
    crate::test_log!("TEST START: test_valid_token_gets_pong");

    let server = TestServer::start().await;
    let mut ws = connect(&server.ws_url(Some(&session_token()))).await;
    let resp = request(&mut ws, json!({"action": "ping"})).await;
    assert_eq!(resp, json!({"action": "pong", "success": true}));

    crate::test_log!("TEST PASS: test_valid_token_gets_pong");
}

#[tokio::test]
async fn test_root_path_also_upgrades() {
    init_test_logging();
    let server = TestServer::start().await;
    let url = format!("ws://{}/?token={}", server.addr, session_token());
    let mut ws = connect(&url).await;
    let resp = request(&mut ws, json!({"action": "ping"})).await;
    assert_eq!(resp["action"], "pong");
}

#[tokio::test]
async fn test_signed_token_with_sparse_claims_is_accepted() {
    init_test_logging();
    crate::test_log!("TEST START: test_signed_token_with_sparse_claims_is_accepted");

    let server = TestServer::start().await;
    for claims in [json!({"username": "ada", "repoId": 1}), json!({"userId": "u", "repoName": 5})] {
        let token = sign_token(&claims, PRIVATE_KEY);
        let mut ws = connect(&server.ws_url(Some(&token))).await;
        let resp = request(&mut ws, json!({"action": "ping"})).await;
        assert_eq!(resp["action"], "pong", "claims {claims} should authenticate");
    }

    crate::test_log!("TEST PASS: test_signed_token_with_sparse_claims_is_accepted");
}
