use std::time::{Duration, SystemTime};

use futures::SinkExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use crate::common::{TestServer, connect, init_test_logging, next_json, request, session_token};

async fn session(server: &TestServer) -> crate::common::WsClient {
    connect(&server.ws_url(Some(&session_token()))).await
}

#[tokio::test]
async fn test_create_astro_page_touches_stylesheet() {
    init_test_logging();
    crate::test_log!("TEST START: test_create_astro_page_touches_stylesheet");

    let server = TestServer::start().await;
    let trigger = server.root().join("src/styles/global.css");
    std::fs::create_dir_all(trigger.parent().unwrap()).unwrap();
    std::fs::write(&trigger, "@import 'tailwindcss';").unwrap();
    let old = SystemTime::now() - Duration::from_secs(3600);
    std::fs::OpenOptions::new()
        .write(true)
        .open(&trigger)
        .unwrap()
        .set_modified(old)
        .unwrap();

    let mut ws = session(&server).await;
    let resp = request(
        &mut ws,
        json!({"action": "create", "path": "src/pages/test.astro", "content": "<h1>x</h1>"}),
    )
    .await;

    assert_eq!(resp["success"], true);
    assert_eq!(resp["path"], "src/pages/test.astro");
    assert_eq!(
        std::fs::read_to_string(server.root().join("src/pages/test.astro")).unwrap(),
        "<h1>x</h1>"
    );
    let touched = std::fs::metadata(&trigger).unwrap().modified().unwrap();
    assert!(touched > old + Duration::from_secs(60));

    crate::test_log!("TEST PASS: test_create_astro_page_touches_stylesheet");
}

#[tokio::test]
async fn test_binary_roundtrip_over_the_wire() {
    init_test_logging();
    let server = TestServer::start().await;
    let mut ws = session(&server).await;

    let payload = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
    let resp = request(
        &mut ws,
        json!({"action": "write", "path": "public/dot.png", "content": payload, "encoding": "base64"}),
    )
    .await;
    assert_eq!(resp["success"], true);

    let resp = request(
        &mut ws,
        json!({"action": "read", "path": "public/dot.png", "encoding": "base64"}),
    )
    .await;
    assert_eq!(resp["content"], payload);
    assert_eq!(resp["encoding"], "base64");
}

#[tokio::test]
async fn test_unsafe_paths_never_mutate() {
    init_test_logging();
    crate::test_log!("TEST START: test_unsafe_paths_never_mutate");

    let server = TestServer::start().await;
    std::fs::create_dir_all(server.root().join(".git")).unwrap();
    std::fs::write(server.root().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
    let mut ws = session(&server).await;

    for (body, echoed) in [
        (json!({"action": "write", "path": "../outside.txt", "content": "x"}), "path"),
        (json!({"action": "write", "path": ".git/HEAD", "content": "x"}), "path"),
        (json!({"action": "delete", "path": ".git"}), "path"),
        (json!({"action": "mkdir", "path": "node_modules/evil"}), "path"),
        (json!({"action": "create", "path": "/etc/rwo-test", "content": "x"}), "path"),
        (json!({"action": "write", "path": "..\\outside.txt", "content": "x"}), "path"),
        (json!({"action": "rename", "oldPath": ".git/HEAD", "newPath": "HEAD"}), "oldPath"),
    ] {
        let resp = request(&mut ws, body.clone()).await;
        assert_eq!(resp["success"], false, "{body} should be refused");
        assert_eq!(resp[echoed], body[echoed]);
    }

    assert_eq!(
        std::fs::read_to_string(server.root().join(".git/HEAD")).unwrap(),
        "ref: refs/heads/main\n"
    );
    assert!(!server.root().join("node_modules").exists());
    assert!(!server.root().join("HEAD").exists());
    assert!(!server.root().parent().unwrap().join("outside.txt").exists());

    crate::test_log!("TEST PASS: test_unsafe_paths_never_mutate");
}

#[tokio::test]
async fn test_rename_without_new_path_fails() {
    init_test_logging();
    let server = TestServer::start().await;
    std::fs::write(server.root().join("a.md"), "a").unwrap();
    let mut ws = session(&server).await;

    let resp = request(&mut ws, json!({"action": "rename", "oldPath": "a.md"})).await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["oldPath"], "a.md");
    assert!(resp["error"].as_str().unwrap().contains("newPath"));
    assert!(server.root().join("a.md").exists());
}

#[tokio::test]
async fn test_mkdir_twice_succeeds() {
    init_test_logging();
    let server = TestServer::start().await;
    let mut ws = session(&server).await;

    for _ in 0..2 {
        let resp = request(&mut ws, json!({"action": "mkdir", "path": "src/content/blog"})).await;
        assert_eq!(resp["success"], true);
    }
    assert!(server.root().join("src/content/blog").is_dir());
}

#[tokio::test]
async fn test_list_and_delete() {
    init_test_logging();
    let server = TestServer::start().await;
    let root = server.root();
    std::fs::create_dir_all(root.join("src/pages")).unwrap();
    std::fs::create_dir_all(root.join("node_modules/react")).unwrap();
    std::fs::create_dir_all(root.join(".astro")).unwrap();
    std::fs::write(root.join("src/pages/index.astro"), "").unwrap();
    std::fs::write(root.join(".env"), "SECRET=1").unwrap();
    let mut ws = session(&server).await;

    let resp = request(&mut ws, json!({"action": "list"})).await;
    assert_eq!(resp["success"], true);
    let mut paths: Vec<String> = resp["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap().to_string())
        .collect();
    paths.sort();
    assert_eq!(paths, vec![".astro", "src", "src/pages", "src/pages/index.astro"]);

    let resp = request(&mut ws, json!({"action": "delete", "path": "src"})).await;
    assert_eq!(resp["success"], true);
    assert!(!root.join("src").exists());
}

#[tokio::test]
async fn test_protocol_errors_keep_connection_open() {
    init_test_logging();
    crate::test_log!("TEST START: test_protocol_errors_keep_connection_open");

    let server = TestServer::start().await;
    let mut ws = session(&server).await;

    ws.send(Message::Text("{this is not json".to_string().into()))
        .await
        .unwrap();
    let resp = next_json(&mut ws).await;
    assert_eq!(
        resp,
        json!({"action": "error", "success": false, "error": "Invalid message format"})
    );

    let resp = request(&mut ws, json!({"action": "teleport"})).await;
    assert_eq!(resp["action"], "teleport");
    assert_eq!(resp["success"], false);
    assert_eq!(resp["error"], "Unsupported action: teleport");

    let resp = request(&mut ws, json!({"action": "read", "path": "missing.md"})).await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["path"], "missing.md");

    let resp = request(&mut ws, json!({"action": "ping"})).await;
    assert_eq!(resp["action"], "pong");

    crate::test_log!("TEST PASS: test_protocol_errors_keep_connection_open");
}

#[tokio::test]
async fn test_binary_frame_is_treated_as_text() {
    init_test_logging();
    let server = TestServer::start().await;
    let mut ws = session(&server).await;

    ws.send(Message::Binary(br#"{"action":"ping"}"#.to_vec().into()))
        .await
        .unwrap();
    let resp = next_json(&mut ws).await;
    assert_eq!(resp["action"], "pong");
}
