//! Environment-driven configuration support.
//!
//! - Type-safe environment variable parsing with error collection
//! - Source tracking so startup logs can say where each value came from

pub mod env;
pub mod source;

pub use env::{EnvError, EnvErrors, EnvParser};
pub use source::{ConfigSource, Sourced};

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
