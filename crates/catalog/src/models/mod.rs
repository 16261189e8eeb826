mod file;
mod gallery;

pub use self::file::FileRecord;
pub(crate) use self::file::FileRow;
pub use self::gallery::GalleryRecord;
pub(crate) use self::gallery::GalleryRow;
