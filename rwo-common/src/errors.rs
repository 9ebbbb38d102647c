//! Error taxonomy for the workspace daemon.
//!
//! | Kind          | Effect                                              |
//! |---------------|-----------------------------------------------------|
//! | Fatal         | process refuses to start                            |
//! | Connection    | connection closed at handshake, no JSON sent        |
//! | Validation    | `success: false`, operation never attempted         |
//! | Operation     | `success: false` with the I/O or subprocess error   |
//! | Protocol      | generic error reply, connection stays open          |
//! | UnknownAction | `success: false` naming the unsupported action      |

use serde::Serialize;

/// Coarse classification of a failure, attached to log events as `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fatal,
    Connection,
    Validation,
    Operation,
    Protocol,
    UnknownAction,
}

impl ErrorKind {
    /// Whether the error should be logged as a security event.
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::Connection | Self::Validation)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Connection => write!(f, "connection"),
            Self::Validation => write!(f, "validation"),
            Self::Operation => write!(f, "operation"),
            Self::Protocol => write!(f, "protocol"),
            Self::UnknownAction => write!(f, "unknown_action"),
        }
    }
}
