//! Sync Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, in the same shape as the rest of the workspace.
//! Most kinds here wrap a failure from one of the collaborating crates;
//! the per-gallery ones end up in the pass report rather than aborting
//! the pass.

use derive_more::{Display, Error};

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("catalog operation failed")]
    Catalog,
    #[display("file hashing failed")]
    Hash,
    #[display("sidecar parsing failed")]
    Sidecar,
    #[display("archive build failed")]
    Archive,
    #[display("gallery discovery failed")]
    Discover,
    /// A queued removal could not be completed; the ledger entry stays
    /// queued and the next pass retries it.
    #[display("removal drain incomplete")]
    Drain,
    #[display("media server notification failed")]
    Notify,
    /// A blocking worker task panicked or was torn down.
    #[display("worker task failed")]
    Worker,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Catalog | Self::Hash | Self::Drain | Self::Notify)
    }
}
