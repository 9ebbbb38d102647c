//! Path safety policy for client-supplied workspace paths.
//!
//! Every path a client sends is relative to the working directory. This
//! module decides whether such a path may be handed to the filesystem at
//! all. It does not canonicalize against the root: accepted paths are used
//! verbatim.

use thiserror::Error;

/// Directory names a client may never address at any depth.
pub const PROTECTED_DIRS: &[&str] = &[".git", "node_modules"];

/// Why a path was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathViolation {
    #[error("path is empty")]
    Empty,

    #[error("absolute paths are not allowed: {0}")]
    Absolute(String),

    #[error("parent directory traversal is not allowed: {0}")]
    Traversal(String),

    #[error("access to {dir} is not allowed: {path}")]
    Protected { dir: &'static str, path: String },
}

/// Check a relative path against the safety policy.
///
/// Backslashes are treated as separators so Windows-style input cannot slip
/// a traversal past the checks.
pub fn check_path(path: &str) -> Result<(), PathViolation> {
    if path.is_empty() {
        return Err(PathViolation::Empty);
    }

    let normalized = path.replace('\\', "/");

    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return Err(PathViolation::Absolute(path.to_string()));
    }

    if normalized == ".."
        || normalized.starts_with("../")
        || normalized.contains("../")
        || normalized.contains("/..")
    {
        return Err(PathViolation::Traversal(path.to_string()));
    }

    let protected = normalized
        .split('/')
        .find_map(|segment| PROTECTED_DIRS.iter().copied().find(|dir| *dir == segment));
    if let Some(dir) = protected {
        return Err(PathViolation::Protected {
            dir,
            path: path.to_string(),
        });
    }

    Ok(())
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
