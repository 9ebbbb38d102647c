//! Daemon configuration.
//!
//! Built once at startup from `RWO_*` environment variables with CLI flags
//! taking precedence, then frozen in an immutable [`ServerConfig`]. Every
//! problem is collected so an operator sees all of them in one run.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rwo_common::config::{EnvError, EnvParser, Sourced};
use thiserror::Error;
use tracing::info;

use crate::auth::Authenticator;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3001;

/// Default transport heartbeat interval.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Default exec handler timeout.
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 120;

/// Default cap on a single inbound message (file uploads travel inline).
pub const DEFAULT_MAX_MESSAGE_BYTES: u64 = 100 * 1024 * 1024;

const PEM_ENVELOPES: &[&str] = &["-----BEGIN PUBLIC KEY-----", "-----BEGIN RSA PUBLIC KEY-----"];

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("no public key configured: set RWO_JWT_PUBLIC_KEY or RWO_JWT_PUBLIC_KEY_FILE")]
    MissingPublicKey,

    #[error("public key is not PEM-encoded (expected a BEGIN PUBLIC KEY block)")]
    NotPem,

    #[error("public key rejected: {0}")]
    InvalidKey(String),

    #[error("failed to read public key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("working directory is not a directory: {0}")]
    WorkdirNotDirectory(PathBuf),

    #[error("invalid bind address '{0}'")]
    InvalidBind(String),
}

/// All problems found while loading configuration.
#[derive(Debug, Error)]
#[error("invalid configuration:\n{}", format_errors(.0))]
pub struct ConfigErrors(pub Vec<ConfigError>);

fn format_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub public_key: Option<String>,
    pub public_key_file: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub workdir: Option<PathBuf>,
    pub heartbeat_secs: Option<u64>,
    pub exec_timeout_secs: Option<u64>,
    pub serialize_mutations: bool,
}

/// Immutable daemon configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Root of every file and git operation.
    pub workdir: PathBuf,
    /// Normalised PEM text of the token verification key.
    pub public_key_pem: String,
    pub heartbeat_interval: Duration,
    pub exec_timeout: Duration,
    pub max_message_bytes: usize,
    /// Guard mutating operations with one workspace-wide lock.
    pub serialize_mutations: bool,
}

impl ServerConfig {
    /// Load from the environment and CLI overrides.
    pub fn load(cli: &CliOverrides) -> Result<Self, ConfigErrors> {
        let mut parser = EnvParser::new();
        let mut errors = Vec::new();

        let bind = parser
            .get_string("BIND", "0.0.0.0")
            .override_with(cli.bind.clone());
        let port = parser
            .get_u16_range("PORT", DEFAULT_PORT, 1, u16::MAX)
            .override_with(cli.port);
        let workdir = match cli.workdir.clone() {
            Some(dir) => Sourced::from_cli(dir),
            None => parser.get_path("WORKDIR", "."),
        };
        let heartbeat = parser
            .get_u64_range("HEARTBEAT_SECS", DEFAULT_HEARTBEAT_SECS, 1, 3600)
            .override_with(cli.heartbeat_secs);
        let exec_timeout = parser
            .get_u64_range("EXEC_TIMEOUT_SECS", DEFAULT_EXEC_TIMEOUT_SECS, 1, 3600)
            .override_with(cli.exec_timeout_secs);
        let max_message = parser.get_u64_range(
            "MAX_MESSAGE_BYTES",
            DEFAULT_MAX_MESSAGE_BYTES,
            1024,
            1024 * 1024 * 1024,
        );
        let serialize = parser.get_bool("SERIALIZE_MUTATIONS", false);
        let serialize_mutations = cli.serialize_mutations || serialize.value;

        let key_inline = parser.get_optional_string("JWT_PUBLIC_KEY");
        let key_file = parser.get_optional_path("JWT_PUBLIC_KEY_FILE");

        errors.extend(parser.take_errors().into_iter().map(ConfigError::from));

        let raw_key = match (cli.public_key.clone(), cli.public_key_file.clone()) {
            (Some(inline), _) => Some(Ok(inline)),
            (None, Some(path)) => Some(read_key_file(&path)),
            (None, None) => match (key_inline.value, key_file.value) {
                (Some(inline), _) => Some(Ok(inline)),
                (None, Some(path)) => Some(read_key_file(&path)),
                (None, None) => None,
            },
        };
        let public_key_pem = match raw_key {
            Some(Ok(raw)) => match validate_public_key(&raw) {
                Ok(pem) => Some(pem),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            Some(Err(e)) => {
                errors.push(e);
                None
            }
            None => {
                errors.push(ConfigError::MissingPublicKey);
                None
            }
        };

        if !workdir.value.is_dir() {
            errors.push(ConfigError::WorkdirNotDirectory(workdir.value.clone()));
        }

        let ip: Option<IpAddr> = match bind.value.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                errors.push(ConfigError::InvalidBind(bind.value.clone()));
                None
            }
        };

        match (ip, public_key_pem) {
            (Some(ip), Some(public_key_pem)) if errors.is_empty() => {
                info!(
                    port = port.value,
                    port_source = %port.source,
                    workdir = %workdir.value.display(),
                    workdir_source = %workdir.source,
                    heartbeat_secs = heartbeat.value,
                    exec_timeout_secs = exec_timeout.value,
                    serialize_mutations,
                    "Configuration loaded"
                );
                Ok(Self {
                    listen_addr: SocketAddr::new(ip, port.value),
                    workdir: workdir.value,
                    public_key_pem,
                    heartbeat_interval: Duration::from_secs(heartbeat.value),
                    exec_timeout: Duration::from_secs(exec_timeout.value),
                    max_message_bytes: usize::try_from(max_message.value)
                        .unwrap_or(usize::MAX),
                    serialize_mutations,
                })
            }
            _ => Err(ConfigErrors(errors)),
        }
    }

    /// Configuration for an in-process server rooted at `workdir`.
    pub fn for_workdir(workdir: impl Into<PathBuf>, public_key_pem: impl Into<String>) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            workdir: workdir.into(),
            public_key_pem: public_key_pem.into(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            exec_timeout: Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES as usize,
            serialize_mutations: false,
        }
    }
}

fn read_key_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Check the PEM envelope and that the key actually parses.
///
/// Keys pasted into environment files often carry literal `\n` sequences
/// instead of newlines; those are expanded first.
pub fn validate_public_key(raw: &str) -> Result<String, ConfigError> {
    let pem = raw.trim().replace("\\n", "\n");
    if !PEM_ENVELOPES.iter().any(|envelope| pem.starts_with(envelope)) {
        return Err(ConfigError::NotPem);
    }
    Authenticator::from_pem(&pem).map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
    Ok(pem)
}
