//! Shared types and utilities for Remote Workspace Operations.
//!
//! Holds everything both the daemon and its tests need to agree on: the JSON
//! wire protocol, the path-safety policy, environment configuration parsing,
//! logging setup and the error taxonomy.

pub mod config;
pub mod errors;
pub mod logging;
pub mod path_safety;
pub mod protocol;

pub use config::{ConfigSource, EnvError, EnvErrors, EnvParser, Sourced};
pub use errors::ErrorKind;
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use path_safety::{PathViolation, check_path};
pub use protocol::{Action, ChangeStatus, FileChange, ListEntry, Request, Response};
