use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;

/// A gallery as read back from the catalog (`galleries_infos` view).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryRecord {
    pub id: i64,
    pub name: String,
    /// External gallery id from the folder name; the dedup/removal key.
    pub gid: u64,
    pub title: String,
    pub upload_account: String,
    pub comment: String,
    pub upload_time: UtcDateTime,
    pub download_time: UtcDateTime,
    pub modified_time: UtcDateTime,
    pub access_time: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct GalleryRow {
    db_gallery_id: i64,
    name: String,
    gid: i64,
    title: String,
    upload_account: String,
    comment: String,
    upload_time: i64,
    download_time: i64,
    modified_time: i64,
    access_time: i64,
}

impl TryFrom<GalleryRow> for GalleryRecord {
    type Error = Error;
    fn try_from(row: GalleryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.db_gallery_id,
            name: row.name,
            gid: u64::try_from(row.gid).or_raise(|| ErrorKind::InvalidData("gid"))?,
            title: row.title,
            upload_account: row.upload_account,
            comment: row.comment,
            upload_time: UtcDateTime::from_unix_timestamp(row.upload_time)
                .or_raise(|| ErrorKind::InvalidData("upload time"))?,
            download_time: UtcDateTime::from_unix_timestamp(row.download_time)
                .or_raise(|| ErrorKind::InvalidData("download time"))?,
            modified_time: UtcDateTime::from_unix_timestamp(row.modified_time)
                .or_raise(|| ErrorKind::InvalidData("modified time"))?,
            access_time: UtcDateTime::from_unix_timestamp(row.access_time)
                .or_raise(|| ErrorKind::InvalidData("access time"))?,
        })
    }
}
