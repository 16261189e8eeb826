//! SQLite catalog for gallery folders.
//!
//! The durable side of the sync engine: galleries, their member files and
//! per-algorithm digests, tag pairs, the pending-removal queue, GID
//! tombstones, and the archive-build ledger the junk learner feeds on.
//! Two views (`galleries_infos`, `files_hashs`) are the denormalized read
//! surface.
//!
//! Repositories are thin handles over the shared pool:
//! [`Galleries`](repo::Galleries) for the gallery aggregate,
//! [`Removals`](repo::Removals) for the deletion ledgers, and
//! [`Builds`](repo::Builds) for archive history and junk signatures.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{FileRecord, GalleryRecord};
pub use crate::repo::{Builds, Galleries, Removals};
