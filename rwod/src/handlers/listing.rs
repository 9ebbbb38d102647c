//! Recursive directory listing for the editor's file tree.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use rwo_common::ListEntry;
use tracing::warn;

/// Dot-prefixed directories the site tooling needs visible.
pub const VISIBLE_HIDDEN_DIRS: &[&str] = &[".astro", ".github"];

/// Directories never listed, hidden or not.
pub const SKIPPED_DIRS: &[&str] = &["node_modules", "dist", ".git"];

/// List `dir` recursively, depth-first, in directory-entry order.
///
/// A directory's own entry comes immediately before its children. Unreadable
/// directories (including a missing `dir`) contribute nothing and are logged.
pub async fn list_recursive(dir: &Path) -> Vec<ListEntry> {
    let mut entries = Vec::new();
    walk(dir.to_path_buf(), String::new(), &mut entries).await;
    entries
}

fn walk<'a>(
    dir: PathBuf,
    prefix: String,
    out: &'a mut Vec<ListEntry>,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to list directory");
                return;
            }
        };

        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                    break;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let is_directory = match entry.file_type().await {
                Ok(ft) => ft.is_dir(),
                Err(e) => {
                    warn!(entry = %name, error = %e, "Failed to stat directory entry");
                    continue;
                }
            };

            if !is_listed(&name, is_directory) {
                continue;
            }

            let rel = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };

            out.push(ListEntry {
                name,
                path: rel.clone(),
                is_directory,
            });

            if is_directory {
                walk(entry.path(), rel, out).await;
            }
        }
    })
}

fn is_listed(name: &str, is_directory: bool) -> bool {
    if SKIPPED_DIRS.contains(&name) {
        return false;
    }
    if name.starts_with('.') {
        return is_directory && VISIBLE_HIDDEN_DIRS.contains(&name);
    }
    true
}
