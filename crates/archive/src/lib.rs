//! CBZ packaging for cataloged galleries.
//!
//! This crate turns a gallery folder into one compressed archive:
//!
//! - members ordered by file name (page order),
//! - known-junk images excluded by content digest,
//! - oversized images re-encoded with their smaller dimension clamped to a
//!   configured maximum (aspect ratio preserved),
//! - output bucketed into flat or date-grouped directories,
//! - staged in a temporary directory and renamed into place, so a partial
//!   archive is never visible at the final path.
//!
//! It also owns the junk-signature learner ([`learn_junk`]) and the
//! post-pass cleanup of archives whose gallery has disappeared
//! ([`remove_stale_archives`]). What it deliberately does *not* do is talk
//! to the catalog: the sync engine reads the rows and passes them in.

mod builder;
mod cleanup;
pub mod error;
mod junk;
mod naming;
mod options;

pub use crate::builder::{BuildOutcome, BuildRequest, BuiltArchive, build_archive};
pub use crate::cleanup::remove_stale_archives;
pub use crate::junk::learn_junk;
pub use crate::naming::archive_file_name;
pub use crate::options::{Grouping, SortKey};
