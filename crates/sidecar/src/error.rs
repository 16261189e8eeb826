//! Sidecar Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, in the same shape as the rest of the workspace.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A sidecar parsing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sidecar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The folder has no sidecar file. Whether that blocks ingestion is
    /// the sync engine's call, not ours.
    #[display("sidecar file missing: {}", _0.display())]
    Missing(#[error(not(source))] PathBuf),
    /// A field was present but could not be parsed. Timestamps and the
    /// GID are load-bearing (archive grouping, dedup keys), so this is
    /// surfaced instead of defaulted.
    #[display("malformed sidecar field '{field}', found value: {value}")]
    Malformed {
        field: &'static str,
        value: String,
    },
    /// A required field never appeared in the sidecar.
    #[display("missing sidecar field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
    /// Reading the folder or sidecar failed for reasons other than absence.
    #[display("I/O error reading {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
