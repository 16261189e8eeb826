//! Aggregate result of one synchronization pass.

use std::fmt;

/// One gallery that could not be processed, with the rendered error chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub gallery: String,
    pub error: String,
}

impl Failure {
    pub fn new(gallery: impl Into<String>, error: &impl fmt::Display) -> Self {
        Self { gallery: gallery.into(), error: error.to_string() }
    }
}

/// Everything that happened in a pass. The pass itself always completes;
/// per-gallery problems land in `failures` / `drain_failures` instead of
/// aborting the run, so there is no silent partial success.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Queued removals fully applied this pass.
    pub drained: Vec<String>,
    /// Queued removals that failed part-way; still queued for next pass.
    pub drain_failures: Vec<Failure>,
    /// Galleries whose rows were written (new or changed).
    pub synced: Vec<String>,
    /// Galleries found identical to their cataloged state.
    pub unchanged: Vec<String>,
    /// Folders skipped because their GID carries a tombstone.
    pub skipped_tombstoned: Vec<String>,
    /// Cataloged galleries no longer on disk, queued for the next drain.
    pub enqueued_removals: Vec<String>,
    /// Archives freshly published this pass.
    pub archives_built: Vec<String>,
    /// Stale archives deleted during post-pass cleanup.
    pub stale_archives_removed: usize,
    /// Gallery units not started because the pass was cancelled.
    pub cancelled: usize,
    /// Galleries that failed to sync or archive.
    pub failures: Vec<Failure>,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.drain_failures.is_empty()
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "pass complete: {} synced, {} unchanged, {} archives built, {} removals drained",
            self.synced.len(),
            self.unchanged.len(),
            self.archives_built.len(),
            self.drained.len(),
        )?;
        if !self.skipped_tombstoned.is_empty() {
            writeln!(f, "skipped (removed GID): {}", self.skipped_tombstoned.join(", "))?;
        }
        if !self.enqueued_removals.is_empty() {
            writeln!(f, "queued for removal: {}", self.enqueued_removals.join(", "))?;
        }
        if self.cancelled > 0 {
            writeln!(f, "cancelled before {} galleries", self.cancelled)?;
        }
        for failure in self.drain_failures.iter().chain(&self.failures) {
            writeln!(f, "failed: {}: {}", failure.gallery, failure.error)?;
        }
        Ok(())
    }
}
