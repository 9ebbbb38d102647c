//! The working directory every connection operates on.
//!
//! All connections share one working tree and its git state. `Workspace` is
//! the single place that turns a client path into a filesystem path, and the
//! single place subprocesses get their current directory from. Mutations may
//! optionally be serialized behind one lock; without it, overlapping writes
//! from different requests race exactly as the underlying filesystem lets
//! them.

use std::path::{Path, PathBuf};

use rwo_common::check_path;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::OpError;

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    mutation_lock: Option<Mutex<()>>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mutation_lock: None,
        }
    }

    /// Serialize mutating operations behind a workspace-wide lock.
    pub fn with_serialized_mutations(mut self) -> Self {
        self.mutation_lock = Some(Mutex::new(()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn serializes_mutations(&self) -> bool {
        self.mutation_lock.is_some()
    }

    /// Validate a client path and join it onto the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, OpError> {
        check_path(relative)?;
        Ok(self.root.join(relative))
    }

    /// Resolve a required request field, reporting which one was missing.
    pub fn resolve_field(
        &self,
        value: Option<&str>,
        field: &'static str,
    ) -> Result<PathBuf, OpError> {
        match value {
            Some(v) => self.resolve(v),
            None => Err(OpError::MissingField(field)),
        }
    }

    /// Hold the mutation lock, if mutations are serialized.
    pub async fn lock_mutations(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.mutation_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }
}
