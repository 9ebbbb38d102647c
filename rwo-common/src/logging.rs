//! Logging initialisation shared by the daemon and its tools.
//!
//! Console output goes to stdout (or stderr with [`LogConfig::with_stderr`]),
//! either human-readable or as JSON lines. An optional log file is written
//! through a non-blocking appender; keep the returned [`LoggingGuards`]
//! alive for the life of the process so buffered lines are flushed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{EnvErrors, EnvParser};

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pretty" | "text" | "human" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level filter (overridden by `RUST_LOG` when set).
    pub level: String,
    pub format: LogFormat,
    /// Optional file sink, always JSON.
    pub file: Option<PathBuf>,
    /// Send console output to stderr instead of stdout.
    pub stderr: bool,
}

impl LogConfig {
    /// Build from `RWO_LOG_LEVEL`, `RWO_LOG_FORMAT` and `RWO_LOG_FILE`.
    pub fn from_env(default_level: &str) -> Result<Self, EnvErrors> {
        let mut parser = EnvParser::new();
        let level = parser.get_log_level("LOG_LEVEL", default_level).value;
        let format = parser
            .get_parsed(
                "LOG_FORMAT",
                LogFormat::default(),
                "pretty or json",
                LogFormat::parse,
            )
            .value;
        let file = parser.get_optional_path("LOG_FILE").value;
        parser.finish()?;
        Ok(Self {
            level,
            format,
            file,
            stderr: false,
        })
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
            stderr: false,
        }
    }
}

/// Keeps non-blocking writers alive.
#[must_use = "dropping the guards stops the file log writer"]
pub struct LoggingGuards {
    _file: Option<WorkerGuard>,
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards> {
    let (file_layer, file_guard) = match config.file.as_deref() {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(true)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr = config.stderr;
    let (pretty, json) = match config.format {
        LogFormat::Pretty => (
            Some(fmt::layer().with_target(true).with_writer(move || console(stderr))),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(move || console(stderr)),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(pretty)
        .with(json)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(LoggingGuards { _file: file_guard })
}

fn console(stderr: bool) -> Box<dyn std::io::Write> {
    if stderr {
        Box::new(std::io::stderr())
    } else {
        Box::new(std::io::stdout())
    }
}

fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("log file path has no file name: {}", path.display()))?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
