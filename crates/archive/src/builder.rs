//! CBZ construction and atomic publish.

use crate::error::{ErrorKind, Result};
use crate::naming::archive_file_name;
use crate::options::Grouping;
use exn::ResultExt;
use image::GenericImageView;
use image::imageops::FilterType;
use koma_sidecar::{GalleryInfo, SIDECAR_FILE_NAME, is_image_file};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Inputs for building one gallery's archive.
///
/// The builder works purely from the folder and the values handed to it;
/// the sync engine owns catalog access and passes the relevant rows down.
pub struct BuildRequest<'a> {
    pub info: &'a GalleryInfo,
    pub archive_root: &'a Path,
    pub grouping: Grouping,
    /// Images whose smaller dimension exceeds this are re-encoded with it
    /// clamped to this value (aspect ratio preserved). Other members pass
    /// through byte-for-byte.
    pub max_image_dimension: u32,
    /// Comparison digests to exclude from the archive.
    pub junk: &'a HashSet<String>,
    /// Member file name → comparison digest, as recorded in the catalog.
    pub digests: &'a BTreeMap<String, String>,
    /// Cataloged comparison digest of the sidecar; used to detect that an
    /// existing archive is already up to date.
    pub sidecar_digest: &'a str,
}

/// A freshly published archive: where it landed and the source-content
/// digests of every member that made it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArchive {
    pub path: PathBuf,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built(BuiltArchive),
    /// The destination archive exists and embeds the current sidecar;
    /// nothing was written.
    UpToDate(PathBuf),
}

/// Build and publish one gallery archive.
///
/// The archive is assembled in a temporary staging directory under the
/// archive root and renamed into its grouped destination only once every
/// member has been written, so a failed build never leaves a partial file
/// at the final path.
#[instrument(skip(request), fields(gallery = %request.info.name))]
pub fn build_archive(request: &BuildRequest<'_>) -> Result<BuildOutcome> {
    let bucket = request.grouping.bucket(request.info.upload_time.date());
    let dest_dir = request.archive_root.join(bucket);
    let dest_path = dest_dir.join(archive_file_name(&request.info.name));

    if dest_path.exists() && archived_sidecar_digest(&dest_path).as_deref() == Some(request.sidecar_digest) {
        tracing::debug!(path = %dest_path.display(), "archive already up to date");
        return Ok(BuildOutcome::UpToDate(dest_path));
    }

    std::fs::create_dir_all(request.archive_root).or_raise(|| ErrorKind::Write(request.archive_root.to_path_buf()))?;
    // Staged under the archive root so the final rename stays on one filesystem.
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(request.archive_root)
        .or_raise(|| ErrorKind::Write(request.archive_root.to_path_buf()))?;
    let staged_path = staging.path().join(archive_file_name(&request.info.name));

    let members = write_members(request, &staged_path)?;

    std::fs::create_dir_all(&dest_dir).or_raise(|| ErrorKind::Write(dest_dir.clone()))?;
    std::fs::rename(&staged_path, &dest_path).or_raise(|| ErrorKind::Write(dest_path.clone()))?;
    tracing::info!(path = %dest_path.display(), members = members.len(), "archive published");
    Ok(BuildOutcome::Built(BuiltArchive { path: dest_path, members }))
}

fn write_members(request: &BuildRequest<'_>, staged_path: &Path) -> Result<Vec<String>> {
    let file = File::create(staged_path).or_raise(|| ErrorKind::Write(staged_path.to_path_buf()))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut members = Vec::new();

    // `info.files` is sorted, so page order in the archive is name order.
    for name in &request.info.files {
        // The sidecar is always embedded (rebuild detection reads it back)
        // and never counts as a member for junk learning; its digest
        // changes with every re-download and would poison the signature set.
        let is_sidecar = name == SIDECAR_FILE_NAME;
        let recorded = request.digests.get(name);
        if !is_sidecar
            && let Some(digest) = recorded
            && request.junk.contains(digest)
        {
            tracing::debug!(member = %name, "excluding junk member");
            continue;
        }
        let source = request.info.folder.join(name);
        let bytes = std::fs::read(&source).or_raise(|| ErrorKind::Read(source.clone()))?;
        let digest = match recorded {
            Some(digest) => digest.clone(),
            // Not in the catalog yet (e.g. appeared after the last refresh):
            // digest the source bytes so the membership record stays complete.
            None => koma_hash::hash_bytes(&bytes).comparison().to_string(),
        };
        if !is_sidecar && recorded.is_none() && request.junk.contains(&digest) {
            tracing::debug!(member = %name, "excluding junk member");
            continue;
        }
        let bytes =
            if is_image_file(name) { shrink_oversized(bytes, &source, request.max_image_dimension)? } else { bytes };
        writer
            .start_file(name.as_str(), options)
            .or_raise(|| ErrorKind::Write(staged_path.to_path_buf()))?;
        writer.write_all(&bytes).or_raise(|| ErrorKind::Write(staged_path.to_path_buf()))?;
        if !is_sidecar {
            members.push(digest);
        }
    }

    writer.finish().or_raise(|| ErrorKind::Write(staged_path.to_path_buf()))?;
    Ok(members)
}

/// Comparison digest of the sidecar embedded in an existing archive, or
/// `None` when the archive is unreadable or carries no sidecar (both of
/// which simply force a rebuild).
fn archived_sidecar_digest(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut archive = ZipArchive::new(file).ok()?;
    let mut entry = archive.by_name(SIDECAR_FILE_NAME).ok()?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).ok()?;
    Some(koma_hash::hash_bytes(&bytes).comparison().to_string())
}

/// Re-encode an image whose smaller dimension exceeds `max`, clamping that
/// dimension to `max` and scaling the other to preserve aspect ratio.
/// Images already within bounds pass through untouched (no re-encode).
fn shrink_oversized(bytes: Vec<u8>, source: &Path, max: u32) -> Result<Vec<u8>> {
    if max == 0 {
        return Ok(bytes);
    }
    let format = image::guess_format(&bytes).or_raise(|| ErrorKind::Image(source.to_path_buf()))?;
    let decoded = image::load_from_memory_with_format(&bytes, format)
        .or_raise(|| ErrorKind::Image(source.to_path_buf()))?;
    let (width, height) = decoded.dimensions();
    let smaller = width.min(height);
    if smaller <= max {
        return Ok(bytes);
    }
    let scale = f64::from(max) / f64::from(smaller);
    let new_width = (f64::from(width) * scale).round() as u32;
    let new_height = (f64::from(height) * scale).round() as u32;
    let resized = decoded.resize_exact(new_width.max(1), new_height.max(1), FilterType::Lanczos3);
    let mut output = Cursor::new(Vec::new());
    resized.write_to(&mut output, format).or_raise(|| ErrorKind::Image(source.to_path_buf()))?;
    Ok(output.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Grouping;
    use koma_sidecar::parse_folder;

    const SIDECAR_TEXT: &str = "Title: Fixture\n\
                                Upload Time: 2024-03-01 17:20:05\n\
                                Uploaded By: pooh\n\
                                Downloaded: 2024-03-02 09:00:00\n\
                                Tags: artist:alice\n";

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::DynamicImage::new_rgb8(width, height);
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn fixture_gallery(root: &Path, pages: &[(&str, Vec<u8>)]) -> GalleryInfo {
        let folder = root.join("[G][Fixture][100]");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join(SIDECAR_FILE_NAME), SIDECAR_TEXT).unwrap();
        for (name, bytes) in pages {
            std::fs::write(folder.join(name), bytes).unwrap();
        }
        parse_folder(&folder).unwrap()
    }

    fn digest_map(info: &GalleryInfo) -> BTreeMap<String, String> {
        info.files
            .iter()
            .map(|name| {
                let bytes = std::fs::read(info.folder.join(name)).unwrap();
                (name.clone(), koma_hash::hash_bytes(&bytes).comparison().to_string())
            })
            .collect()
    }

    #[test]
    fn test_build_excludes_junk_members() {
        let dir = tempfile::tempdir().unwrap();
        let info = fixture_gallery(
            dir.path(),
            &[("001.png", png_bytes(4, 4)), ("002.png", png_bytes(4, 4)), ("003.png", png_bytes(8, 4))],
        );
        let digests = digest_map(&info);
        let junk: HashSet<String> = [digests["003.png"].clone()].into();
        let archive_root = dir.path().join("archives");
        let request = BuildRequest {
            info: &info,
            archive_root: &archive_root,
            grouping: Grouping::Flat,
            max_image_dimension: 768,
            junk: &junk,
            digests: &digests,
            sidecar_digest: &digests[SIDECAR_FILE_NAME],
        };

        let BuildOutcome::Built(built) = build_archive(&request).unwrap() else {
            panic!("expected a fresh build");
        };
        let mut archive = ZipArchive::new(File::open(&built.path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len()).map(|i| archive.by_index(i).unwrap().name().to_string()).collect();
        assert_eq!(names, vec!["001.png", "002.png", SIDECAR_FILE_NAME]);
        // Membership records page digests only: no junk, no sidecar.
        assert_eq!(built.members, vec![digests["001.png"].clone(), digests["002.png"].clone()]);
    }

    #[test]
    fn test_rebuild_is_skipped_when_sidecar_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let info = fixture_gallery(dir.path(), &[("001.png", png_bytes(4, 4))]);
        let digests = digest_map(&info);
        let junk = HashSet::new();
        let archive_root = dir.path().join("archives");
        let request = BuildRequest {
            info: &info,
            archive_root: &archive_root,
            grouping: Grouping::ByYearMonth,
            max_image_dimension: 768,
            junk: &junk,
            digests: &digests,
            sidecar_digest: &digests[SIDECAR_FILE_NAME],
        };

        let BuildOutcome::Built(built) = build_archive(&request).unwrap() else {
            panic!("expected a fresh build");
        };
        assert_eq!(built.path, archive_root.join("2024/03/[G][Fixture][100].cbz"));
        assert_eq!(build_archive(&request).unwrap(), BuildOutcome::UpToDate(built.path));
    }

    #[test]
    fn test_oversized_image_is_resized_with_aspect_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let info = fixture_gallery(dir.path(), &[("001.png", png_bytes(600, 300))]);
        let digests = digest_map(&info);
        let junk = HashSet::new();
        let archive_root = dir.path().join("archives");
        let request = BuildRequest {
            info: &info,
            archive_root: &archive_root,
            grouping: Grouping::Flat,
            max_image_dimension: 100,
            junk: &junk,
            digests: &digests,
            sidecar_digest: &digests[SIDECAR_FILE_NAME],
        };

        let BuildOutcome::Built(built) = build_archive(&request).unwrap() else {
            panic!("expected a fresh build");
        };
        let mut archive = ZipArchive::new(File::open(&built.path).unwrap()).unwrap();
        let mut bytes = Vec::new();
        archive.by_name("001.png").unwrap().read_to_end(&mut bytes).unwrap();
        let image = image::load_from_memory(&bytes).unwrap();
        assert_eq!(image.dimensions(), (200, 100));
    }

    #[test]
    fn test_within_bounds_image_passes_through_untouched() {
        let source = png_bytes(50, 20);
        let shrunk = shrink_oversized(source.clone(), Path::new("001.png"), 20).unwrap();
        assert_eq!(shrunk, source);
    }
}
