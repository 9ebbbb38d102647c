//! Wire protocol for the workspace WebSocket.
//!
//! Every inbound frame is a JSON object with an `action` discriminator and a
//! handful of optional, action-specific fields. Every outbound frame echoes
//! the `action` (plus identifying fields such as `path`) and carries
//! `success` with either a payload or an `error` string. There are no request
//! IDs; clients correlate by the echoed fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Operations the daemon understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Ping,
    Read,
    Write,
    Create,
    Mkdir,
    Delete,
    Rename,
    List,
    Git,
    GitStatus,
    GitDiff,
    GitCommit,
    GitPush,
    GitPullForce,
    Exec,
}

impl Action {
    /// Resolve a wire action name. Returns `None` for unknown actions.
    ///
    /// `gitStatus` is accepted as a legacy spelling of `git-status`.
    pub fn parse(name: &str) -> Option<Self> {
        let action = match name {
            "ping" => Self::Ping,
            "read" => Self::Read,
            "write" => Self::Write,
            "create" => Self::Create,
            "mkdir" => Self::Mkdir,
            "delete" => Self::Delete,
            "rename" => Self::Rename,
            "list" => Self::List,
            "git" => Self::Git,
            "git-status" | "gitStatus" => Self::GitStatus,
            "git-diff" => Self::GitDiff,
            "git-commit" => Self::GitCommit,
            "git-push" => Self::GitPush,
            "git-pull-force" => Self::GitPullForce,
            "exec" => Self::Exec,
            _ => return None,
        };
        Some(action)
    }

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Read => "read",
            Self::Write => "write",
            Self::Create => "create",
            Self::Mkdir => "mkdir",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::List => "list",
            Self::Git => "git",
            Self::GitStatus => "git-status",
            Self::GitDiff => "git-diff",
            Self::GitCommit => "git-commit",
            Self::GitPush => "git-push",
            Self::GitPullForce => "git-pull-force",
            Self::Exec => "exec",
        }
    }

    /// Whether the action changes workspace state.
    ///
    /// Used to decide which operations take the workspace mutation lock when
    /// mutations are serialized.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Write
                | Self::Create
                | Self::Mkdir
                | Self::Delete
                | Self::Rename
                | Self::Git
                | Self::GitCommit
                | Self::GitPush
                | Self::GitPullForce
                | Self::Exec
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded client request.
///
/// Only `action` is required at the decoding layer; handlers enforce the
/// fields their action needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Operation discriminator.
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Transfer encoding for `read`/`write`: `"utf8"` (default) or `"base64"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Commit message for `git-commit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Target file for `git-diff`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Request {
    /// Build a request for `action` with every other field empty.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_rename(mut self, old_path: impl Into<String>, new_path: impl Into<String>) -> Self {
        self.old_path = Some(old_path.into());
        self.new_path = Some(new_path.into());
        self
    }

    /// Every path-bearing field present on this request, in field order.
    ///
    /// `git-diff` carries its path in `file`.
    pub fn path_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = Vec::new();
        if let Some(path) = self.path.as_deref() {
            fields.push(("path", path));
        }
        if let Some(old_path) = self.old_path.as_deref() {
            fields.push(("oldPath", old_path));
        }
        if let Some(new_path) = self.new_path.as_deref() {
            fields.push(("newPath", new_path));
        }
        if let Some(file) = self.file.as_deref() {
            fields.push(("file", file));
        }
        fields
    }

    /// True when the request asked for base64 transfer encoding.
    pub fn wants_base64(&self) -> bool {
        self.encoding
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case("base64"))
    }
}

/// A single reply frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Action-specific result fields, flattened into the top-level object.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Response {
    /// A successful reply with no payload yet.
    pub fn ok(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            path: None,
            old_path: None,
            new_path: None,
            success: true,
            error: None,
            data: Map::new(),
        }
    }

    /// A failed reply carrying a human-readable error.
    pub fn failure(action: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::ok(action)
        }
    }

    /// Reply for an inbound frame that could not be decoded.
    pub fn invalid_message() -> Self {
        Self::failure("error", "Invalid message format")
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_optional_path(mut self, path: Option<&str>) -> Self {
        self.path = path.map(str::to_string);
        self
    }

    pub fn with_rename_paths(mut self, old_path: Option<&str>, new_path: Option<&str>) -> Self {
        self.old_path = old_path.map(str::to_string);
        self.new_path = new_path.map(str::to_string);
        self
    }

    /// Attach a payload field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Look up a payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// One entry produced by a recursive directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    pub name: String,
    /// Path relative to the listing root, `/`-separated.
    pub path: String,
    pub is_directory: bool,
}

/// Change classification derived from `git status --porcelain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Untracked,
    Added,
    Deleted,
    Renamed,
    Modified,
}

impl ChangeStatus {
    /// Classify the two-character `XY` porcelain status code.
    ///
    /// Anything that isn't untracked, added, deleted or renamed is reported as
    /// modified.
    pub fn from_porcelain(code: &str) -> Self {
        if code.contains('?') {
            Self::Untracked
        } else if code.contains('A') {
            Self::Added
        } else if code.contains('D') {
            Self::Deleted
        } else if code.contains('R') {
            Self::Renamed
        } else {
            Self::Modified
        }
    }
}

/// A changed path reported by `git-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub status: ChangeStatus,
}
