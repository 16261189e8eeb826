//! The gallery synchronization engine.
//!
//! Reconciles a tree of downloaded gallery folders against the catalog,
//! one pass at a time:
//!
//! 1. drain the pending-removal queue (deletions always come first),
//! 2. discover sidecar-bearing folders, skip tombstoned GIDs, and
//!    reconcile each gallery (metadata, member files, full digest sets,
//!    tags) — unchanged galleries are zero-write no-ops,
//! 3. queue removals for cataloged galleries that vanished from disk,
//! 4. build and record archives, learn junk signatures, clean up stale
//!    archives, and nudge the media server.
//!
//! Per-gallery failures never abort the pass; everything lands in the
//! returned [`PassReport`].

mod discover;
mod engine;
pub mod error;
mod notify;
mod report;

pub use crate::discover::discover_galleries;
pub use crate::engine::{PassOptions, SyncEngine};
pub use crate::notify::{LibraryNotifier, NoopNotifier};
pub use crate::report::{Failure, PassReport};
