//! Subprocess execution scoped to the workspace root.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::OpError;

/// How long to keep draining pipes after a timed-out child was killed.
///
/// Grandchildren (e.g. a dev server started by `npm run`) can hold the pipes
/// open after the shell dies.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, as a user would see them on a terminal.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}{}", self.stdout, self.stderr),
        }
    }

    /// Turn a nonzero exit into [`OpError::CommandFailed`].
    pub fn into_result(self, what: &str) -> Result<Self, OpError> {
        if self.success() {
            return Ok(self);
        }
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };
        let message = match self.exit_code {
            Some(code) if detail.is_empty() => format!("{what} exited with status {code}"),
            Some(code) => format!("{what} exited with status {code}: {detail}"),
            None => format!("{what} was terminated by a signal"),
        };
        Err(OpError::CommandFailed {
            message,
            output: self.combined(),
            exit_code: self.exit_code,
        })
    }
}

/// Run `command` through `sh -c` in `cwd`.
pub async fn run_shell(
    cwd: &Path,
    command: &str,
    limit: Option<Duration>,
) -> Result<CommandOutput, OpError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    run(cwd, cmd, command, limit).await
}

/// Run a program with explicit arguments (no shell) in `cwd`.
pub async fn run_program(
    cwd: &Path,
    program: &str,
    args: &[&str],
) -> Result<CommandOutput, OpError> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    let label = format!("{} {}", program, args.join(" "));
    run(cwd, cmd, &label, None).await
}

async fn run(
    cwd: &Path,
    mut cmd: Command,
    label: &str,
    limit: Option<Duration>,
) -> Result<CommandOutput, OpError> {
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = %label, cwd = %cwd.display(), "Spawning subprocess");
    let mut child = cmd.spawn()?;

    let stdout_buf = Arc::new(Mutex::new(Vec::new()));
    let stderr_buf = Arc::new(Mutex::new(Vec::new()));
    let stdout_task = child
        .stdout
        .take()
        .map(|pipe| spawn_drain(pipe, stdout_buf.clone()));
    let stderr_task = child
        .stderr
        .take()
        .map(|pipe| spawn_drain(pipe, stderr_buf.clone()));

    let status = match limit {
        Some(limit) => match timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(command = %label, ?limit, "Subprocess timed out, killing");
                let _ = child.kill().await;
                finish_drain(stdout_task, DRAIN_GRACE).await;
                finish_drain(stderr_task, DRAIN_GRACE).await;
                let partial = CommandOutput {
                    stdout: take_string(&stdout_buf),
                    stderr: take_string(&stderr_buf),
                    exit_code: None,
                };
                return Err(OpError::Timeout {
                    after: limit,
                    output: partial.combined(),
                });
            }
        },
        None => child.wait().await?,
    };

    finish_drain(stdout_task, DRAIN_GRACE).await;
    finish_drain(stderr_task, DRAIN_GRACE).await;

    Ok(CommandOutput {
        stdout: take_string(&stdout_buf),
        stderr: take_string(&stderr_buf),
        exit_code: status.code(),
    })
}

fn spawn_drain<R>(mut pipe: R, buf: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut guard) = buf.lock() {
                        guard.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
    })
}

async fn finish_drain(task: Option<JoinHandle<()>>, grace: Duration) {
    if let Some(mut task) = task
        && timeout(grace, &mut task).await.is_err()
    {
        task.abort();
    }
}

fn take_string(buf: &Arc<Mutex<Vec<u8>>>) -> String {
    match buf.lock() {
        Ok(mut guard) => String::from_utf8_lossy(&std::mem::take(&mut *guard)).into_owned(),
        Err(_) => String::new(),
    }
}
