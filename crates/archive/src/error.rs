//! Archive Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, in the same shape as the rest of the workspace.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A member file could not be read from the gallery folder.
    #[display("cannot read archive member: {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// The destination (or its staging area) could not be written. The
    /// final path never holds a partial archive: everything is staged in
    /// a temporary directory and renamed into place on success.
    #[display("cannot write archive: {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
    /// A member that looks like an image could not be decoded or re-encoded.
    #[display("cannot process image: {}", _0.display())]
    Image(#[error(not(source))] PathBuf),
    /// A grouping or sort configuration value was not recognised.
    #[display("unknown option value: {_0}")]
    UnknownOption(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Read(_) | Self::Write(_))
    }
}
