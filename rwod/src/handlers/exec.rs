//! Constrained shell execution.
//!
//! Only commands matching one of [`ALLOWED_PATTERNS`] run, and only when they
//! contain none of [`SHELL_METACHARACTERS`]. Everything runs in the workspace
//! root under the configured timeout.

use std::sync::OnceLock;
use std::time::Duration;

use regex::RegexSet;
use rwo_common::{Request, Response};
use tracing::{error, info, warn};

use crate::error::OpError;
use crate::process::run_shell;
use crate::workspace::Workspace;

/// Anchored patterns for permitted command lines.
pub const ALLOWED_PATTERNS: &[&str] = &[
    // Dependency install, optionally scoped to one workspace package.
    r"^npm\s+(install|i|ci)(\s+(--workspace=[\w@./-]+|-w\s+[\w@./-]+))?(\s+[\w@./:^~=-]+)*$",
    // Process manager lifecycle.
    r"^pm2\s+(restart|start|stop|reload)\s+[\w@.:-]+$",
    // Kill by command-line pattern.
    r#"^pkill\s+-f\s+("[^"]+"|'[^']+'|[\w@./:-]+)$"#,
    // Any package script.
    r"^npm\s+run\s+[\w@.:-]+(\s+.*)?$",
];

/// Characters that would let a matching prefix chain into another command.
pub const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '>', '<', '\n', '\r'];

fn allowed_set() -> Option<&'static RegexSet> {
    static SET: OnceLock<Result<RegexSet, regex::Error>> = OnceLock::new();
    match SET.get_or_init(|| RegexSet::new(ALLOWED_PATTERNS)) {
        Ok(set) => Some(set),
        Err(e) => {
            error!(error = %e, "Exec allow-list failed to compile, refusing all commands");
            None
        }
    }
}

/// Decide whether `command` may run.
pub fn is_allowed(command: &str) -> bool {
    let command = command.trim();
    if command.is_empty() || command.contains(SHELL_METACHARACTERS) {
        return false;
    }
    allowed_set().is_some_and(|set| set.is_match(command))
}

pub async fn exec(ws: &Workspace, req: &Request, limit: Duration) -> Result<Response, OpError> {
    let command = req
        .command
        .as_deref()
        .ok_or(OpError::MissingField("command"))?;

    if !is_allowed(command) {
        warn!(command, "Rejected exec command");
        return Err(OpError::CommandNotAllowed(command.to_string()));
    }

    info!(command, timeout_secs = limit.as_secs(), "Executing command");
    let out = run_shell(ws.root(), command.trim(), Some(limit))
        .await?
        .into_result(command)?;

    Ok(Response::ok(&req.action)
        .with("command", command)
        .with("output", out.combined()))
}
