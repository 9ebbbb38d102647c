//! Remote Workspace Operations daemon.
//!
//! Accepts authenticated WebSocket connections and performs sandboxed file,
//! git and process operations against a single working directory on behalf
//! of the remote client.

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod liveness;
pub mod process;
pub mod server;
pub mod workspace;

pub use auth::{Authenticator, AuthError, Identity};
pub use config::{CliOverrides, ConfigError, ServerConfig};
pub use dispatch::Dispatcher;
pub use error::OpError;
pub use server::{AppState, create_router, start_server};
pub use workspace::Workspace;
