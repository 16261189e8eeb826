//! Parsing of the per-folder `galleryinfo.txt` sidecar.
//!
//! Every gallery folder written by the download client carries one sidecar
//! text file with a `Key: Value` line grammar: title, upload account,
//! upload/download timestamps, a comma-separated tag list, and an optional
//! free-text uploader comment block. This crate turns a folder into a
//! [`GalleryInfo`] record; what to do when the sidecar is missing or
//! broken is policy that lives with the caller.

pub mod error;
mod model;
mod parse;

pub use crate::model::{GalleryInfo, Tag, is_image_file};

use exn::{OptionExt, ResultExt};
use std::io;
use std::path::Path;
use time::OffsetDateTime;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// File name of the sidecar inside every gallery folder. Its presence is
/// what makes a directory a gallery folder during discovery.
pub const SIDECAR_FILE_NAME: &str = "galleryinfo.txt";

/// Parse a gallery folder: sidecar fields plus the folder-derived parts
/// (name, GID, member file listing, sidecar modified time).
///
/// # Errors
/// - [`ErrorKind::Missing`] if the folder has no sidecar file.
/// - [`ErrorKind::Malformed`] / [`ErrorKind::MissingField`] for grammar
///   violations, always naming the offending field.
/// - [`ErrorKind::Io`] for any other read failure.
#[instrument(skip(folder), fields(folder = %folder.as_ref().display()))]
pub fn parse_folder(folder: impl AsRef<Path>) -> Result<GalleryInfo> {
    let folder = folder.as_ref();
    let sidecar_path = folder.join(SIDECAR_FILE_NAME);
    let text = match std::fs::read_to_string(&sidecar_path) {
        Ok(text) => text,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            exn::bail!(ErrorKind::Missing(sidecar_path))
        },
        Err(_) => exn::bail!(ErrorKind::Io(sidecar_path)),
    };

    let name = folder
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_raise(|| ErrorKind::Malformed { field: "folder", value: folder.display().to_string() })?
        .to_string();
    let gid = parse::parse_gid(&name)?;

    let modified_time = std::fs::metadata(&sidecar_path)
        .and_then(|meta| meta.modified())
        .map(OffsetDateTime::from)
        .or_raise(|| ErrorKind::Io(sidecar_path.clone()))?;

    let mut files = Vec::new();
    let entries = std::fs::read_dir(folder).or_raise(|| ErrorKind::Io(folder.to_path_buf()))?;
    for entry in entries {
        let entry = entry.or_raise(|| ErrorKind::Io(folder.to_path_buf()))?;
        if entry.file_type().or_raise(|| ErrorKind::Io(folder.to_path_buf()))?.is_file()
            && let Some(file_name) = entry.file_name().to_str()
        {
            files.push(file_name.to_string());
        }
    }
    files.sort();

    let fields = parse::parse_text(&text)?;
    Ok(GalleryInfo {
        folder: folder.to_path_buf(),
        name,
        gid,
        title: fields.title,
        upload_account: fields.upload_account,
        upload_time: fields.upload_time,
        download_time: fields.download_time,
        modified_time,
        comment: fields.comment,
        tags: fields.tags,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;

    const SIDECAR_TEXT: &str = "Title: Teatime Cookbook\n\
                                Upload Time: 2024-03-01 17:20:05\n\
                                Uploaded By: pooh\n\
                                Downloaded: 2024-03-02 09:00:00\n\
                                Tags: artist:alice, group\n";

    #[test]
    fn test_parse_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("[G][Title][100]");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join(SIDECAR_FILE_NAME), SIDECAR_TEXT).unwrap();
        std::fs::write(folder.join("001.jpg"), b"a").unwrap();
        std::fs::write(folder.join("002.jpg"), b"b").unwrap();

        let info = parse_folder(&folder).unwrap();
        assert_eq!(info.gid, 100);
        assert_eq!(info.name, "[G][Title][100]");
        assert_eq!(info.files, vec!["001.jpg", "002.jpg", SIDECAR_FILE_NAME]);
        assert_eq!(info.pages(), 2);
        assert_eq!(info.tags, vec![Tag::new("artist", "alice"), Tag::new("", "group")]);
    }

    #[test]
    fn test_parse_folder_without_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("[77]");
        std::fs::create_dir(&folder).unwrap();
        let error = parse_folder(&folder).unwrap_err();
        assert!(matches!(error.deref(), ErrorKind::Missing(_)));
    }
}
