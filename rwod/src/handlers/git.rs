//! Git operations scoped to the workspace root.
//!
//! The generic `git` action forwards a command line to the shell after
//! checking only its first word against [`ALLOWED_SUBCOMMANDS`]. Everything
//! past that word is passed through untouched, so the check narrows what a
//! client can ask for without making the shell safe. The structured actions
//! call `git` directly with argument vectors.

use rwo_common::{ChangeStatus, FileChange, Request, Response};
use tracing::{info, warn};

use crate::error::OpError;
use crate::process::{run_program, run_shell};
use crate::workspace::Workspace;

/// Subcommands the generic `git` action may start with.
pub const ALLOWED_SUBCOMMANDS: &[&str] = &[
    "status", "diff", "log", "branch", "add", "commit", "push", "pull", "fetch", "checkout",
    "stash",
];

/// Remote that `git-pull-force` resets against.
pub const REMOTE: &str = "origin";

/// Check the first word of a generic git command line.
pub fn check_subcommand(command: &str) -> Result<(), OpError> {
    match command.split_whitespace().next() {
        Some(sub) if ALLOWED_SUBCOMMANDS.contains(&sub) => Ok(()),
        _ => Err(OpError::CommandNotAllowed(format!("git {}", command.trim()))),
    }
}

pub async fn git(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let command = req
        .command
        .as_deref()
        .ok_or(OpError::MissingField("command"))?;

    if let Err(e) = check_subcommand(command) {
        warn!(command, "Rejected git command");
        return Err(e);
    }

    let out = run_shell(ws.root(), &format!("git {command}"), None)
        .await?
        .into_result("git")?;

    Ok(Response::ok(&req.action)
        .with("command", command)
        .with("output", out.stdout))
}

pub async fn status(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let out = run_program(ws.root(), "git", &["status", "--porcelain"])
        .await?
        .into_result("git status")?;

    let files = serde_json::to_value(parse_porcelain(&out.stdout)).map_err(std::io::Error::other)?;
    Ok(Response::ok(&req.action).with("files", files))
}

pub async fn diff(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let file = req.file.as_deref().ok_or(OpError::MissingField("file"))?;
    ws.resolve(file)?;

    let out = run_program(ws.root(), "git", &["diff", "--", file])
        .await?
        .into_result("git diff")?;

    Ok(Response::ok(&req.action)
        .with("file", file)
        .with("diff", out.stdout))
}

/// Stage everything, then commit with the caller's message.
pub async fn commit(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let message = req
        .message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or(OpError::MissingField("message"))?;

    run_program(ws.root(), "git", &["add", "-A"])
        .await?
        .into_result("git add")?;
    let out = run_program(ws.root(), "git", &["commit", "-m", message])
        .await?
        .into_result("git commit")?;

    info!(summary = %first_line(&out.stdout), "Committed");
    Ok(Response::ok(&req.action).with("output", out.stdout))
}

pub async fn push(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let out = run_program(ws.root(), "git", &["push"])
        .await?
        .into_result("git push")?;
    // git reports push progress on stderr.
    Ok(Response::ok(&req.action).with("output", out.combined()))
}

/// Fetch the remote and hard-reset the current branch onto its remote
/// counterpart. Local commits and uncommitted changes are discarded.
pub async fn pull_force(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    run_program(ws.root(), "git", &["fetch", REMOTE])
        .await?
        .into_result("git fetch")?;

    let head = run_program(ws.root(), "git", &["rev-parse", "--abbrev-ref", "HEAD"])
        .await?
        .into_result("git rev-parse")?;
    let branch = head.stdout.trim().to_string();

    let target = format!("{REMOTE}/{branch}");
    let out = run_program(ws.root(), "git", &["reset", "--hard", &target])
        .await?
        .into_result("git reset")?;

    warn!(branch = %branch, target = %target, "Working tree hard-reset to remote");
    Ok(Response::ok(&req.action)
        .with("branch", branch)
        .with("output", out.stdout))
}

/// Parse `git status --porcelain` (v1) output.
pub fn parse_porcelain(output: &str) -> Vec<FileChange> {
    output
        .lines()
        .filter_map(|line| {
            let code = line.get(..2)?;
            let rest = line.get(3..)?.trim();
            if rest.is_empty() {
                return None;
            }
            let path = match rest.split_once(" -> ") {
                Some((_, to)) => to,
                None => rest,
            };
            Some(FileChange {
                path: path.to_string(),
                status: ChangeStatus::from_porcelain(code),
            })
        })
        .collect()
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default()
}
