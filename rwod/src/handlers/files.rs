//! File operations: read, write, create, mkdir, delete, rename, list.

use std::path::Path;
use std::time::SystemTime;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rwo_common::{Request, Response};
use tracing::{debug, info};

use super::listing::list_recursive;
use crate::error::OpError;
use crate::workspace::Workspace;

/// Stylesheet whose mtime is bumped when markup changes, so the site's
/// utility-CSS watcher rescans for new class names.
pub const STYLE_TRIGGER_FILE: &str = "src/styles/global.css";

/// Extensions whose writes bump [`STYLE_TRIGGER_FILE`].
pub const STYLE_TRIGGER_EXTENSIONS: &[&str] =
    &["astro", "html", "jsx", "tsx", "vue", "svelte", "md", "mdx"];

pub async fn read(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let rel = req.path.as_deref().ok_or(OpError::MissingField("path"))?;
    let target = ws.resolve(rel)?;

    let (content, encoding) = if req.wants_base64() {
        let bytes = tokio::fs::read(&target).await?;
        (BASE64.encode(bytes), "base64")
    } else {
        (tokio::fs::read_to_string(&target).await?, "utf8")
    };

    Ok(Response::ok(&req.action)
        .with_path(rel)
        .with("content", content)
        .with("encoding", encoding))
}

/// Overwrite (or create) a file. `content` is required.
pub async fn write(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let content = req.content.as_deref().ok_or(OpError::MissingField("content"))?;
    store(ws, req, content).await
}

/// Like [`write`], but a missing `content` creates an empty file.
pub async fn create(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    store(ws, req, req.content.as_deref().unwrap_or("")).await
}

async fn store(ws: &Workspace, req: &Request, content: &str) -> Result<Response, OpError> {
    let rel = req.path.as_deref().ok_or(OpError::MissingField("path"))?;
    let target = ws.resolve(rel)?;

    let bytes = if req.wants_base64() {
        BASE64.decode(content)?
    } else {
        content.as_bytes().to_vec()
    };

    ensure_parent(&target).await?;
    tokio::fs::write(&target, &bytes).await?;
    debug!(path = rel, bytes = bytes.len(), "File written");

    if triggers_style_rebuild(rel) {
        touch_style_trigger(ws.root()).await;
    }

    Ok(Response::ok(&req.action).with_path(rel))
}

pub async fn mkdir(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let rel = req.path.as_deref().ok_or(OpError::MissingField("path"))?;
    let target = ws.resolve(rel)?;
    tokio::fs::create_dir_all(&target).await?;
    Ok(Response::ok(&req.action).with_path(rel))
}

/// Remove a file, or a directory recursively. Deleting something that is
/// already gone succeeds.
pub async fn delete(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let rel = req.path.as_deref().ok_or(OpError::MissingField("path"))?;
    let target = ws.resolve(rel)?;

    match tokio::fs::symlink_metadata(&target).await {
        Ok(meta) if meta.is_dir() => match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        },
        Ok(_) => tokio::fs::remove_file(&target).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = rel, "Delete target already absent");
        }
        Err(e) => return Err(e.into()),
    }

    info!(path = rel, "Deleted");
    Ok(Response::ok(&req.action).with_path(rel))
}

pub async fn rename(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let from = ws.resolve_field(req.old_path.as_deref(), "oldPath")?;
    let to = ws.resolve_field(req.new_path.as_deref(), "newPath")?;

    ensure_parent(&to).await?;
    tokio::fs::rename(&from, &to).await?;

    info!(
        old_path = req.old_path.as_deref(),
        new_path = req.new_path.as_deref(),
        "Renamed"
    );
    Ok(Response::ok(&req.action).with_rename_paths(req.old_path.as_deref(), req.new_path.as_deref()))
}

/// List the workspace root, or the directory named by `path`.
pub async fn list(ws: &Workspace, req: &Request) -> Result<Response, OpError> {
    let dir = match req.path.as_deref() {
        Some(rel) => ws.resolve(rel)?,
        None => ws.root().to_path_buf(),
    };
    let files = list_recursive(&dir).await;
    let files = serde_json::to_value(files).map_err(std::io::Error::other)?;

    Ok(Response::ok(&req.action)
        .with_optional_path(req.path.as_deref())
        .with("files", files))
}

async fn ensure_parent(target: &Path) -> Result<(), OpError> {
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

fn triggers_style_rebuild(rel: &str) -> bool {
    Path::new(rel)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            STYLE_TRIGGER_EXTENSIONS
                .iter()
                .any(|t| t.eq_ignore_ascii_case(ext))
        })
}

/// Bump the trigger stylesheet's mtime. Never fails the calling operation.
async fn touch_style_trigger(root: &Path) {
    let trigger = root.join(STYLE_TRIGGER_FILE);
    let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let file = std::fs::OpenOptions::new().write(true).open(&trigger)?;
        file.set_modified(SystemTime::now())
    })
    .await;

    match result {
        Ok(Ok(())) => debug!(trigger = STYLE_TRIGGER_FILE, "Touched style trigger"),
        Ok(Err(e)) => debug!(trigger = STYLE_TRIGGER_FILE, error = %e, "Style trigger not touched"),
        Err(e) => debug!(error = %e, "Style trigger task failed"),
    }
}
