use std::path::PathBuf;
use time::{OffsetDateTime, PrimitiveDateTime};

/// One `category:value` tag pair from the sidecar's `Tags` line.
///
/// Tags without a category prefix land in the untagged bucket: an empty
/// category string, not a sentinel word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub category: String,
    pub value: String,
}

impl Tag {
    pub fn new(category: impl Into<String>, value: impl Into<String>) -> Self {
        Self { category: category.into(), value: value.into() }
    }
}

/// Everything known about a gallery folder after parsing its sidecar.
///
/// Timestamps from the sidecar are naive datetimes (the download client
/// writes them without an offset); the folder's modified time comes from
/// filesystem metadata and is therefore absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryInfo {
    /// Absolute path of the gallery folder.
    pub folder: PathBuf,
    /// Folder base name; unique among currently-present galleries.
    pub name: String,
    /// External gallery id parsed from the folder name. Immutable;
    /// the dedup and removal key.
    pub gid: u64,
    pub title: String,
    pub upload_account: String,
    pub upload_time: PrimitiveDateTime,
    pub download_time: PrimitiveDateTime,
    /// Modified time of the sidecar file itself.
    pub modified_time: OffsetDateTime,
    /// Free-text uploader comment block; empty if the sidecar has none.
    pub comment: String,
    /// Ordered, deduplicated tag pairs.
    pub tags: Vec<Tag>,
    /// All member file names in the folder (sidecar included), sorted.
    pub files: Vec<String>,
}

impl GalleryInfo {
    /// Number of image members; the sort key for page-count ordering.
    pub fn pages(&self) -> usize {
        self.files.iter().filter(|name| is_image_file(name)).count()
    }
}

/// Whether a member file name looks like a page image.
pub fn is_image_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    [".jpg", ".jpeg", ".png", ".gif", ".webp"].iter().any(|ext| lower.ends_with(ext))
}
