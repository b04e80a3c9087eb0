//! Error types for batch texture extraction.

use thiserror::Error;

/// Errors that stop a batch, or keep it from starting.
///
/// Per-item failures are not represented here: they are reported as
/// [`BatchEvent::ItemFailed`](crate::BatchEvent::ItemFailed) and the batch
/// moves on.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("invalid batch request: {0}")]
    InvalidRequest(String),

    #[error("cannot write ledger {path}: {reason}")]
    OutputWrite { path: String, reason: String },

    #[error("batch worker panicked")]
    WorkerPanicked,

    #[error("core error: {0}")]
    Core(#[from] phenotex_core::Error),
}

impl BatchError {
    pub(crate) fn output_write(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        BatchError::OutputWrite {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias for batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;
