//! `RWO_*` environment variable parsing.
//!
//! Each getter returns a [`Sourced`] value and never fails on its own: a
//! bad value falls back to the default and the problem is recorded, so the
//! caller can report every misconfiguration in one go.

use super::source::Sourced;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Prefix shared by every variable the daemon reads.
pub const ENV_PREFIX: &str = "RWO_";

/// Accepted values for `RWO_LOG_LEVEL`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A variable that was set but could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("{var}: expected {expected}, got '{value}'")]
    Invalid {
        var: String,
        expected: &'static str,
        value: String,
    },

    #[error("{var}: {value} is outside {min}..={max}")]
    OutOfRange {
        var: String,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Every problem found by one parser.
#[derive(Debug, Error)]
#[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct EnvErrors(pub Vec<EnvError>);

/// Collects `RWO_*` values and the problems found reading them.
#[derive(Debug, Default)]
pub struct EnvParser {
    errors: Vec<EnvError>,
}

impl EnvParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    /// `Ok` if every variable read so far was usable.
    pub fn finish(mut self) -> Result<(), EnvErrors> {
        let errors = self.take_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EnvErrors(errors))
        }
    }

    fn lookup(name: &str) -> (String, Option<String>) {
        let var = format!("{ENV_PREFIX}{name}");
        let value = env::var(&var).ok();
        (var, value)
    }

    /// Read `name` through `parse`; `None` from `parse` records an
    /// [`EnvError::Invalid`] naming `expected`.
    pub fn get_parsed<T>(
        &mut self,
        name: &str,
        default: T,
        expected: &'static str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Sourced<T> {
        let (var, value) = Self::lookup(name);
        let Some(value) = value else {
            return Sourced::default_value(default);
        };
        match parse(&value) {
            Some(parsed) => Sourced::from_env(parsed, var),
            None => {
                self.errors.push(EnvError::Invalid {
                    var,
                    expected,
                    value,
                });
                Sourced::default_value(default)
            }
        }
    }

    pub fn get_string(&mut self, name: &str, default: &str) -> Sourced<String> {
        self.get_parsed(name, default.to_string(), "a string", |v| {
            Some(v.to_string())
        })
    }

    /// `1/true/yes/on` or `0/false/no/off`; empty counts as false.
    pub fn get_bool(&mut self, name: &str, default: bool) -> Sourced<bool> {
        self.get_parsed(name, default, "a boolean (true/false)", |v| {
            match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" | "" => Some(false),
                _ => None,
            }
        })
    }

    pub fn get_u64_range(&mut self, name: &str, default: u64, min: u64, max: u64) -> Sourced<u64> {
        let parsed = self.get_parsed(name, default, "an unsigned integer", |v| {
            v.trim().parse::<u64>().ok()
        });
        if parsed.value < min || parsed.value > max {
            self.errors.push(EnvError::OutOfRange {
                var: parsed
                    .env_var
                    .clone()
                    .unwrap_or_else(|| format!("{ENV_PREFIX}{name}")),
                value: parsed.value,
                min,
                max,
            });
            return Sourced::default_value(default);
        }
        parsed
    }

    pub fn get_u16_range(&mut self, name: &str, default: u16, min: u16, max: u16) -> Sourced<u16> {
        let wide = self.get_u64_range(name, u64::from(default), u64::from(min), u64::from(max));
        Sourced {
            value: u16::try_from(wide.value).unwrap_or(default),
            source: wide.source,
            env_var: wide.env_var,
        }
    }

    /// Lower-cased log level from [`LOG_LEVELS`].
    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        self.get_parsed(
            name,
            default.to_string(),
            "one of trace|debug|info|warn|error|off",
            |v| {
                let lower = v.to_ascii_lowercase();
                LOG_LEVELS.contains(&lower.as_str()).then_some(lower)
            },
        )
    }

    /// A path with `~/` expanded.
    pub fn get_path(&mut self, name: &str, default: &str) -> Sourced<PathBuf> {
        match self.get_optional_path(name) {
            Sourced {
                value: Some(path),
                source,
                env_var,
            } => Sourced {
                value: path,
                source,
                env_var,
            },
            _ => Sourced::default_value(expand_home(default)),
        }
    }

    /// `None` when unset or empty.
    pub fn get_optional_string(&mut self, name: &str) -> Sourced<Option<String>> {
        match Self::lookup(name) {
            (var, Some(value)) => Sourced::from_env(Some(value).filter(|v| !v.is_empty()), var),
            (_, None) => Sourced::default_value(None),
        }
    }

    pub fn get_optional_path(&mut self, name: &str) -> Sourced<Option<PathBuf>> {
        let raw = self.get_optional_string(name);
        Sourced {
            value: raw.value.as_deref().map(expand_home),
            source: raw.source,
            env_var: raw.env_var,
        }
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(value: &str) -> PathBuf {
    if let Some(stripped) = value.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(value)
}
