//! Error types for the skillbox sandbox.

use skillbox_error::Violation;
use thiserror::Error;

/// Fatal errors: the run cannot proceed and no report is produced.
///
/// Per-test failures (a thrown exception, a blown resource limit, a
/// wall-clock timeout) are *not* errors — they are recorded as outcomes in
/// the report and the batch continues. An `Err` from the harness means
/// either the candidate was rejected by the static gate or the
/// infrastructure itself failed.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The static gate rejected the candidate. Zero tests were run.
    #[error("candidate rejected: {0}")]
    Rejected(#[from] Violation),

    /// The candidate's source text is empty.
    #[error("candidate source is empty")]
    EmptySource,

    /// The candidate's source exceeds the configured maximum size.
    #[error("candidate exceeds maximum size of {max} bytes (got {actual})")]
    CodeTooLarge {
        /// Maximum allowed size.
        max: usize,
        /// Actual size.
        actual: usize,
    },

    /// Infrastructure failure (worker binary missing, spawn failed, ...).
    #[error("sandbox execution failed: {0}")]
    Execution(#[from] anyhow::Error),

    /// Serialization of a value crossing the isolation boundary failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
