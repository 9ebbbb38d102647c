//! HTTP surface: WebSocket upgrade and health endpoint.
//!
//! Provides:
//! - `/ws` (and `/`) - authenticated WebSocket for workspace operations
//! - `/health` - basic daemon health check

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use rwo_common::ErrorKind;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, Authenticator, TOKEN_PARAM};
use crate::config::ServerConfig;
use crate::connection::{self, ConnectionContext};
use crate::dispatch::Dispatcher;
use crate::workspace::Workspace;

/// Shared state for HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub authenticator: Authenticator,
    pub dispatcher: Arc<Dispatcher>,
    /// Currently authenticated connections.
    pub connections: Arc<AtomicUsize>,
    /// Daemon version.
    pub version: &'static str,
    /// Daemon start time.
    pub started_at: Instant,
    /// Daemon PID.
    pub pid: u32,
}

impl AppState {
    /// Build the runtime state from a loaded configuration.
    pub fn new(config: ServerConfig) -> Result<Self, AuthError> {
        let authenticator = Authenticator::from_pem(&config.public_key_pem)?;

        let mut workspace = Workspace::new(config.workdir.clone());
        if config.serialize_mutations {
            workspace = workspace.with_serialized_mutations();
        }
        let dispatcher = Dispatcher::new(Arc::new(workspace), config.exec_timeout);

        Ok(Self {
            config: Arc::new(config),
            authenticator,
            dispatcher: Arc::new(dispatcher),
            connections: Arc::new(AtomicUsize::new(0)),
            version: env!("CARGO_PKG_VERSION"),
            started_at: Instant::now(),
            pid: std::process::id(),
        })
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(Arc::new(state))
}

/// Handler for the WebSocket upgrade.
///
/// The upgrade always completes; an unauthenticated socket is then closed
/// with a policy-violation frame.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let conn_id = Uuid::new_v4();
    let auth = state
        .authenticator
        .authenticate(params.get(TOKEN_PARAM).map(String::as_str));
    let limit = state.config.max_message_bytes;

    let ctx = ConnectionContext {
        dispatcher: state.dispatcher.clone(),
        heartbeat_interval: state.config.heartbeat_interval,
        connections: state.connections.clone(),
    };

    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| async move {
            match auth {
                Ok(identity) => connection::serve(socket, identity, conn_id, ctx).await,
                Err(e) => {
                    warn!(
                        conn_id = %conn_id,
                        kind = %ErrorKind::Connection,
                        error = %e,
                        "Authentication failed"
                    );
                    connection::reject(socket, conn_id).await;
                }
            }
        })
}

/// Handler for `/health` - Basic daemon health check.
///
/// Returns 200 OK if the daemon is running.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime_secs = state.started_at.elapsed().as_secs();

    Json(json!({
        "status": "healthy",
        "version": state.version,
        "pid": state.pid,
        "uptime_seconds": uptime_secs,
        "connections": state.connection_count(),
    }))
}

/// Serve on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(
        %addr,
        workdir = %state.config.workdir.display(),
        "Listening for workspace connections"
    );
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Start the server on an already-bound listener.
///
/// # Returns
/// A handle to the spawned server task.
pub fn start_server(
    listener: TcpListener,
    state: AppState,
) -> JoinHandle<Result<(), std::io::Error>> {
    tokio::spawn(serve(listener, state, std::future::pending()))
}
