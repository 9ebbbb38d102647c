//! Routes decoded requests to their handlers.
//!
//! Path validation happens here, once, for every path-bearing field before
//! any handler runs. Handlers re-resolve through [`Workspace`] but never see
//! a request that failed the check.

use std::sync::Arc;
use std::time::Duration;

use rwo_common::{Action, ErrorKind, Request, Response, check_path};
use tracing::{debug, info, warn};

use crate::error::OpError;
use crate::handlers::{exec, files, git};
use crate::workspace::Workspace;

/// Shared by every connection; holds no per-connection state.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    workspace: Arc<Workspace>,
    exec_timeout: Duration,
}

impl Dispatcher {
    pub fn new(workspace: Arc<Workspace>, exec_timeout: Duration) -> Self {
        Self {
            workspace,
            exec_timeout,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Decode one inbound text frame and answer it.
    pub async fn handle_text(&self, text: &str) -> Response {
        match serde_json::from_str::<Request>(text) {
            Ok(req) => self.dispatch(req).await,
            Err(e) => {
                warn!(error = %e, kind = %ErrorKind::Protocol, "Invalid message");
                Response::invalid_message()
            }
        }
    }

    pub async fn dispatch(&self, req: Request) -> Response {
        let Some(action) = Action::parse(&req.action) else {
            warn!(action = %req.action, kind = %ErrorKind::UnknownAction, "Unsupported action");
            let error = format!("Unsupported action: {}", req.action);
            return Response::failure(&req.action, error);
        };

        // Ping carries no workspace path; anything in its path fields is ignored.
        let paths = if action == Action::Ping {
            Vec::new()
        } else {
            req.path_fields()
        };
        for (field, value) in paths {
            if let Err(violation) = check_path(value) {
                warn!(
                    action = %action,
                    field,
                    path = value,
                    reason = %violation,
                    "Rejected unsafe path"
                );
                return failure_response(&req, violation.into());
            }
        }

        let _guard = if action.is_mutating() {
            self.workspace.lock_mutations().await
        } else {
            None
        };

        debug!(action = %action, path = req.path.as_deref(), "Dispatching");
        match self.run(action, &req).await {
            Ok(resp) => resp,
            Err(e) => {
                let kind = e.kind();
                if kind.is_security_event() {
                    warn!(action = %action, kind = %kind, error = %e, "Request refused");
                } else {
                    info!(action = %action, kind = %kind, error = %e, "Operation failed");
                }
                failure_response(&req, e)
            }
        }
    }

    async fn run(&self, action: Action, req: &Request) -> Result<Response, OpError> {
        let ws = self.workspace.as_ref();
        match action {
            Action::Ping => Ok(Response::ok("pong")),
            Action::Read => files::read(ws, req).await,
            Action::Write => files::write(ws, req).await,
            Action::Create => files::create(ws, req).await,
            Action::Mkdir => files::mkdir(ws, req).await,
            Action::Delete => files::delete(ws, req).await,
            Action::Rename => files::rename(ws, req).await,
            Action::List => files::list(ws, req).await,
            Action::Git => git::git(ws, req).await,
            Action::GitStatus => git::status(ws, req).await,
            Action::GitDiff => git::diff(ws, req).await,
            Action::GitCommit => git::commit(ws, req).await,
            Action::GitPush => git::push(ws, req).await,
            Action::GitPullForce => git::pull_force(ws, req).await,
            Action::Exec => exec::exec(ws, req, self.exec_timeout).await,
        }
    }
}

/// Failure reply echoing the request's identifying fields.
fn failure_response(req: &Request, err: OpError) -> Response {
    let mut resp = Response::failure(&req.action, err.to_string())
        .with_optional_path(req.path.as_deref())
        .with_rename_paths(req.old_path.as_deref(), req.new_path.as_deref());
    if let Some(file) = req.file.as_deref() {
        resp = resp.with("file", file);
    }
    if let Some(command) = req.command.as_deref() {
        resp = resp.with("command", command);
    }
    if let Some(output) = err.partial_output() {
        resp = resp.with("output", output);
    }
    if let Some(code) = err.exit_code() {
        resp = resp.with("exitCode", code);
    }
    resp
}
