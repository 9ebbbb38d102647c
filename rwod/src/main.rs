//! Remote Workspace Operations - daemon
//!
//! Serves authenticated WebSocket connections that read, write and version
//! files in one working directory on behalf of a remote editor.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rwo_common::{ErrorKind, LogConfig, init_logging};
use rwod::{AppState, CliOverrides, ServerConfig, server};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "rwod")]
#[command(author, version, about = "RWO daemon - remote workspace operations over WebSocket")]
struct Cli {
    /// PEM-encoded RSA public key used to verify connection tokens
    #[arg(long)]
    public_key: Option<String>,

    /// Read the token verification key from a file
    #[arg(long)]
    public_key_file: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Working directory all operations are scoped to
    #[arg(short, long)]
    workdir: Option<PathBuf>,

    /// Seconds between transport heartbeats
    #[arg(long)]
    heartbeat_secs: Option<u64>,

    /// Seconds before an exec command is killed
    #[arg(long)]
    exec_timeout_secs: Option<u64>,

    /// Serialize mutating operations behind one workspace lock
    #[arg(long)]
    serialize_mutations: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            public_key: self.public_key.clone(),
            public_key_file: self.public_key_file.clone(),
            bind: self.bind.clone(),
            port: self.port,
            workdir: self.workdir.clone(),
            heartbeat_secs: self.heartbeat_secs,
            exec_timeout_secs: self.exec_timeout_secs,
            serialize_mutations: self.serialize_mutations,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let mut log_config = LogConfig::from_env("info")
        .context("Invalid logging configuration")?
        .with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    info!("Starting RWO daemon...");

    let config = match ServerConfig::load(&cli.overrides()) {
        Ok(config) => config,
        Err(errors) => {
            error!(kind = %ErrorKind::Fatal, "{errors}");
            return Err(errors.into());
        }
    };
    let addr = config.listen_addr;

    let state = AppState::new(config).context("Failed to initialise token verification")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    server::serve(listener, state, shutdown_signal())
        .await
        .context("Server error")?;

    info!("RWO daemon stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
