use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use rwod::{AppState, ServerConfig, start_server};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const PUBLIC_KEY: &str = include_str!("../fixtures/test_public.pem");

/// A daemon on an ephemeral port, rooted in its own temporary directory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_workdir(dir.path(), PUBLIC_KEY);
        config.exec_timeout = Duration::from_secs(10);
        configure(&mut config);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(config).unwrap();
        let handle = start_server(listener, state);

        Self { addr, dir, handle }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn ws_url(&self, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/ws?token={}", self.addr, token),
            None => format!("ws://{}/ws", self.addr),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
