//! One WebSocket connection: writer task, reader loop and heartbeat.
//!
//! Inbound frames are dispatched on their own tasks, so a slow git or exec
//! call never stalls the reader. Replies go out through a single writer task
//! that owns the sink half of the socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{SinkExt, StreamExt};
use rwo_common::{ErrorKind, Response};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::auth::Identity;
use crate::dispatch::Dispatcher;
use crate::liveness::Heartbeat;

/// Close code sent when authentication fails.
pub const POLICY_VIOLATION: u16 = 1008;

/// Close reason sent when authentication fails.
pub const UNAUTHORIZED_REASON: &str = "Unauthorized";

const OUTBOUND_QUEUE: usize = 100;

/// Frames queued for the writer task.
#[derive(Debug)]
pub enum Outbound {
    Json(Response),
    Ping,
}

/// Everything a connection needs from the server.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub dispatcher: Arc<Dispatcher>,
    pub heartbeat_interval: std::time::Duration,
    pub connections: Arc<AtomicUsize>,
}

/// Aborts the connection's background tasks however the reader exits.
struct ConnectionGuard {
    conn_id: Uuid,
    writer: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
    connections: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.heartbeat.abort();
        self.writer.abort();
        let remaining = self.connections.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        info!(conn_id = %self.conn_id, connections = remaining, "Connection closed");
    }
}

/// Close an unauthenticated socket with a policy-violation frame. No JSON is
/// ever sent on this path.
pub async fn reject(mut socket: WebSocket, conn_id: Uuid) {
    let frame = close_frame(POLICY_VIOLATION, UNAUTHORIZED_REASON);
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        debug!(conn_id = %conn_id, error = %e, "Failed to send close frame");
    }
}

/// Serve an authenticated connection until it closes, errors or its
/// heartbeat expires.
pub async fn serve(socket: WebSocket, identity: Identity, conn_id: Uuid, ctx: ConnectionContext) {
    let span = info_span!(
        "conn",
        conn_id = %conn_id,
        user = %identity.username,
        repo = identity.repo_name.as_deref().unwrap_or("-"),
    );
    run(socket, identity, conn_id, ctx).instrument(span).await
}

async fn run(socket: WebSocket, identity: Identity, conn_id: Uuid, ctx: ConnectionContext) {
    let count = ctx.connections.fetch_add(1, Ordering::SeqCst) + 1;
    info!(
        user_id = identity.user_id.as_deref(),
        repo_id = identity.repo_id.as_deref(),
        connections = count,
        "Connection authenticated"
    );

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE);

    let writer = tokio::spawn(
        async move {
            while let Some(out) = rx.recv().await {
                let msg = match out {
                    Outbound::Json(resp) => match serde_json::to_string(&resp) {
                        Ok(json) => Message::Text(json.into()),
                        Err(e) => {
                            error!(error = %e, "Failed to serialize response");
                            continue;
                        }
                    },
                    Outbound::Ping => Message::Ping(Default::default()),
                };
                if sink.send(msg).await.is_err() {
                    debug!("Socket send failed, client gone");
                    break;
                }
            }
        }
        .in_current_span(),
    );

    let heartbeat = Arc::new(Heartbeat::new(ctx.heartbeat_interval));
    let dead = Arc::new(Notify::new());
    let heartbeat_task = heartbeat.clone().spawn(tx.clone(), dead.clone());

    let _guard = ConnectionGuard {
        conn_id,
        writer,
        heartbeat: heartbeat_task,
        connections: ctx.connections.clone(),
    };

    loop {
        let msg = tokio::select! {
            _ = dead.notified() => {
                warn!(kind = %ErrorKind::Connection, "Terminating unresponsive connection");
                break;
            }
            msg = stream.next() => msg,
        };

        let text = match msg {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    // The reader must stay free to observe heartbeat expiry.
                    if tx.try_send(Outbound::Json(Response::invalid_message())).is_err() {
                        debug!("Outbound queue unavailable, dropping error reply");
                    }
                    continue;
                }
            },
            Some(Ok(Message::Pong(_))) => {
                heartbeat.mark_alive();
                continue;
            }
            // axum answers pings itself.
            Some(Ok(Message::Ping(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                debug!(code = frame.as_ref().map(|f| f.code), "Client closed connection");
                break;
            }
            Some(Err(e)) => {
                debug!(error = %e, "Socket read failed");
                break;
            }
            None => break,
        };

        let dispatcher = ctx.dispatcher.clone();
        let reply = tx.clone();
        tokio::spawn(
            async move {
                let resp = dispatcher.handle_text(&text).await;
                if reply.send(Outbound::Json(resp)).await.is_err() {
                    debug!("Connection closed before reply was sent");
                }
            }
            .in_current_span(),
        );
    }
}

fn close_frame(code: u16, reason: &str) -> CloseFrame {
    // Close reasons are limited to 123 bytes on the wire.
    let reason: String = reason.chars().take(123).collect();
    CloseFrame {
        code,
        reason: reason.into(),
    }
}
