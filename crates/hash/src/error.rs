//! Hashing Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, in the same shape as the rest of the workspace.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A hashing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for hashing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The source file could not be opened, or a read failed mid-stream.
    /// No partial digests are ever handed out.
    #[display("file unavailable: {}", _0.display())]
    Unavailable(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A file that couldn't be read this pass may well be readable on
        // the next one (slow mounts, files still being written).
        matches!(self, Self::Unavailable(_))
    }
}
