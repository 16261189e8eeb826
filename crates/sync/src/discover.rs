//! Candidate folder discovery under the download root.

use crate::error::{ErrorKind, Result};
use koma_sidecar::SIDECAR_FILE_NAME;
use std::path::{Path, PathBuf};
use tracing::instrument;
use walkdir::WalkDir;

/// Find every gallery folder under the root: any directory that directly
/// contains a sidecar file, at any depth.
///
/// Unreadable subtrees are skipped with a warning; a missing or unreadable
/// root is an error.
#[instrument(skip(root), fields(root = %root.as_ref().display()))]
pub fn discover_galleries(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        exn::bail!(ErrorKind::Discover);
    }
    let mut folders = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(%error, "skipping unreadable entry during discovery");
                continue;
            },
        };
        if entry.file_type().is_file()
            && entry.file_name() == SIDECAR_FILE_NAME
            && let Some(folder) = entry.path().parent()
        {
            folders.push(folder.to_path_buf());
        }
    }
    folders.sort();
    Ok(folders)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovers_nested_sidecar_folders_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("a/[one][1]")).unwrap();
        std::fs::write(root.join("a/[one][1]").join(SIDECAR_FILE_NAME), b"").unwrap();
        std::fs::create_dir_all(root.join("[two][2]")).unwrap();
        std::fs::write(root.join("[two][2]").join(SIDECAR_FILE_NAME), b"").unwrap();
        std::fs::create_dir_all(root.join("not-a-gallery")).unwrap();
        std::fs::write(root.join("not-a-gallery/readme.txt"), b"").unwrap();

        let folders = discover_galleries(root).unwrap();
        assert_eq!(folders, vec![root.join("[two][2]"), root.join("a/[one][1]")]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_galleries(dir.path().join("nope")).is_err());
    }
}
