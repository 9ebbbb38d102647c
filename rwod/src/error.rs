//! Operation-level failures.
//!
//! Every variant ends up as a `success: false` reply; none of them closes the
//! connection.

use std::time::Duration;

use rwo_common::{ErrorKind, PathViolation};
use thiserror::Error;

/// Failure of a single workspace operation.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("Invalid path: {0}")]
    UnsafePath(#[from] PathViolation),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid base64 content: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Command not allowed: {0}")]
    CommandNotAllowed(String),

    #[error("{message}")]
    CommandFailed {
        message: String,
        output: String,
        exit_code: Option<i32>,
    },

    #[error("Command timed out after {}s", .after.as_secs())]
    Timeout { after: Duration, output: String },
}

impl OpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsafePath(_) | Self::MissingField(_) | Self::CommandNotAllowed(_) => {
                ErrorKind::Validation
            }
            Self::Io(_) | Self::Decode(_) | Self::CommandFailed { .. } | Self::Timeout { .. } => {
                ErrorKind::Operation
            }
        }
    }

    /// Whatever the failed subprocess printed before it failed.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { output, .. } | Self::Timeout { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}
