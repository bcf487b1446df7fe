//! Error types for policyship-sync.
//!
//! Only [`ReconcileError`] aborts a run. Transport and packaging errors are
//! folded into per-artifact outcomes and never propagate past a worker.

use std::path::PathBuf;

use thiserror::Error;

use policyship_core::{ConfigError, LedgerError};
use policyship_detector::DetectError;

/// Fatal errors: the run stops and the ledger is left untouched.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The ledger could not be read or written.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Baseline or head could not be resolved, or the working copy does not
    /// hold head.
    #[error("change detection failed: {0}")]
    Detect(#[from] DetectError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No registry URL was configured for a run that needs the registry.
    #[error("no registry URL configured; set registry_url in .policyship.yaml or pass --registry-url")]
    MissingRegistry,

    /// The worker runtime could not be started.
    #[error("failed to start worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The run was interrupted before results were merged.
    #[error("run cancelled before the ledger was updated")]
    Cancelled,
}

/// A registry call that never produced an HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request to {target} failed: {message}")]
pub struct TransportError {
    pub target: String,
    pub message: String,
}

impl TransportError {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Errors while building a publish request body.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact directory {dir} contains no files")]
    Empty { dir: PathBuf },
}

/// Convenience constructor for [`PackageError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PackageError {
    PackageError::Io {
        path: path.into(),
        source,
    }
}
