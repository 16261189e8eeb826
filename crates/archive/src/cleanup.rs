//! Removal of stale archives after a sync pass.

use crate::error::{ErrorKind, Result};
use crate::naming::{archive_file_name, is_live_archive};
use exn::ResultExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::instrument;
use walkdir::WalkDir;

/// Delete published archives whose gallery no longer exists, then prune
/// any group directories the deletions emptied.
///
/// `live_gallery_names` are folder names currently present under the
/// download root; anything in the archive tree that is not one of their
/// archive file names is removed. Returns the paths that were deleted.
#[instrument(skip_all, fields(root = %archive_root.display()))]
pub fn remove_stale_archives(archive_root: &Path, live_gallery_names: &HashSet<String>) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !archive_root.exists() {
        return Ok(removed);
    }
    let live_files: HashSet<String> = live_gallery_names.iter().map(|name| archive_file_name(name)).collect();

    for entry in WalkDir::new(archive_root).into_iter().filter_map(|entry| entry.ok()) {
        if entry.file_type().is_file() && !is_live_archive(entry.path(), &live_files) {
            std::fs::remove_file(entry.path()).or_raise(|| ErrorKind::Write(entry.path().to_path_buf()))?;
            tracing::info!(path = %entry.path().display(), "stale archive removed");
            removed.push(entry.path().to_path_buf());
        }
    }

    // Deepest directories first; remove_dir refuses non-empty ones, which
    // is exactly the filter we want.
    for entry in WalkDir::new(archive_root).contents_first(true).into_iter().filter_map(|entry| entry.ok()) {
        if entry.file_type().is_dir() && entry.path() != archive_root && std::fs::remove_dir(entry.path()).is_ok() {
            tracing::info!(path = %entry.path().display(), "empty archive directory removed");
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_archives_and_empty_dirs_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("archives");
        std::fs::create_dir_all(root.join("2024/03")).unwrap();
        std::fs::write(root.join("2024/03/[old][1].cbz"), b"zip").unwrap();
        std::fs::write(root.join("[current][2].cbz"), b"zip").unwrap();

        let live: HashSet<String> = ["[current][2]".to_string()].into();
        let removed = remove_stale_archives(&root, &live).unwrap();

        assert_eq!(removed, vec![root.join("2024/03/[old][1].cbz")]);
        assert!(!root.join("2024").exists(), "emptied group dirs should be pruned");
        assert!(root.join("[current][2].cbz").exists());
    }

    #[test]
    fn test_missing_root_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let removed = remove_stale_archives(&dir.path().join("nope"), &HashSet::new()).unwrap();
        assert!(removed.is_empty());
    }
}
