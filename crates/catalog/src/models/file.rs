/// A member file row, without its digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub gallery_id: i64,
    /// File name, unique within the owning gallery.
    pub name: String,
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    db_file_id: i64,
    db_gallery_id: i64,
    name: String,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        Self { id: row.db_file_id, gallery_id: row.db_gallery_id, name: row.name }
    }
}
