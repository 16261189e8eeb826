//! Catalog Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, in the same shape as the rest of the workspace.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A unique constraint fired during upsert. In practice this means two
    /// differently-named folders claim the same GID; the conflicting
    /// gallery's sync fails, the pass continues.
    #[display("catalog conflict for gallery '{_0}'")]
    Conflict(#[error(not(source))] String),
    /// A value read from or written to the store doesn't fit the model.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // SQLITE_BUSY surfaces as Database; a later pass may get the lock.
        matches!(self, Self::Database)
    }
}
