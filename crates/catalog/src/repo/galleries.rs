//! Repository for the gallery aggregate: the gallery row plus its files,
//! digests, and tags.
//!
//! Writes follow upsert-by-natural-key semantics: re-syncing unchanged
//! data touches zero rows (the upsert statements carry change predicates),
//! changed fields rewrite their row, and tag sets are replaced wholesale
//! in one transaction because a partial tag update cannot express "tag
//! removed".

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{FileRecord, FileRow, GalleryRecord, GalleryRow};
use exn::ResultExt;
use koma_hash::{Algorithm, DigestSet};
use koma_sidecar::{GalleryInfo, Tag};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteQueryResult;
use time::UtcDateTime;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct Galleries {
    pool: SqlitePool,
}

impl From<&Database> for Galleries {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl Galleries {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update the gallery row keyed by folder name, returning its
    /// surrogate id.
    ///
    /// Returns [`ErrorKind::Conflict`] when another folder already claims
    /// this gallery's GID; the caller treats that as fatal for this gallery
    /// only.
    #[instrument(skip_all, fields(gallery = %info.name))]
    pub async fn upsert_gallery(&self, info: &GalleryInfo) -> Result<i64> {
        let gid = i64::try_from(info.gid).or_raise(|| ErrorKind::InvalidData("gid"))?;
        let result = sqlx::query(include_str!("../../queries/upsert_gallery.sql"))
            .bind(&info.name)
            .bind(gid)
            .bind(&info.title)
            .bind(&info.upload_account)
            .bind(&info.comment)
            .bind(info.upload_time.assume_utc().unix_timestamp())
            .bind(info.download_time.assume_utc().unix_timestamp())
            .bind(info.modified_time.unix_timestamp())
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await;
        raise_for_gallery(result, &info.name)?;
        let id: i64 = sqlx::query_scalar(include_str!("../../queries/get_gallery_id.sql"))
            .bind(&info.name)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(id)
    }

    pub async fn lookup_id(&self, name: impl AsRef<str>) -> Result<Option<i64>> {
        sqlx::query_scalar(include_str!("../../queries/get_gallery_id.sql"))
            .bind(name.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub async fn get_by_name(&self, name: impl AsRef<str>) -> Result<Option<GalleryRecord>> {
        let row: Option<GalleryRow> = sqlx::query_as(include_str!("../../queries/get_gallery_by_name.sql"))
            .bind(name.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(GalleryRecord::try_from).transpose()
    }

    /// All cataloged folder names; the sync engine diffs this against the
    /// folders actually on disk.
    pub async fn list_names(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../../queries/list_gallery_names.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Recorded comparison digest of a gallery's sidecar file, if any.
    /// The sync engine's change detector.
    pub async fn sidecar_digest(&self, name: impl AsRef<str>) -> Result<Option<String>> {
        sqlx::query_scalar(include_str!("../../queries/sidecar_digest.sql"))
            .bind(koma_hash::COMPARISON_ALGORITHM.name())
            .bind(name.as_ref())
            .bind(koma_sidecar::SIDECAR_FILE_NAME)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Insert or refresh one member file and its full digest set, as a
    /// single transaction. Digest rows are only rewritten when the digest
    /// actually changed.
    pub async fn upsert_file(&self, gallery_id: i64, name: &str, digests: &DigestSet) -> Result<i64> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let file_id: i64 = sqlx::query_scalar(include_str!("../../queries/upsert_file.sql"))
            .bind(gallery_id)
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (algorithm, digest) in digests.iter() {
            sqlx::query(include_str!("../../queries/upsert_file_hash.sql"))
                .bind(file_id)
                .bind(algorithm.name())
                .bind(digest)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(file_id)
    }

    pub async fn list_files(&self, gallery_id: i64) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../../queries/list_files.sql"))
            .bind(gallery_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(FileRecord::from).collect())
    }

    /// Delete file rows (and, via cascade, their digests) whose names are
    /// no longer present in the folder. Returns how many were dropped.
    pub async fn retain_files(&self, gallery_id: i64, keep: &[String]) -> Result<u64> {
        let mut dropped = 0;
        for file in self.list_files(gallery_id).await? {
            if !keep.contains(&file.name) {
                sqlx::query(include_str!("../../queries/delete_file.sql"))
                    .bind(gallery_id)
                    .bind(&file.name)
                    .execute(&self.pool)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                dropped += 1;
            }
        }
        Ok(dropped)
    }

    /// `(file name, digest)` pairs for one gallery under one algorithm,
    /// ordered by file name.
    pub async fn file_digests(&self, gallery_id: i64, algorithm: Algorithm) -> Result<Vec<(String, String)>> {
        sqlx::query_as(include_str!("../../queries/file_digests.sql"))
            .bind(algorithm.name())
            .bind(gallery_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Replace the gallery's tag set wholesale (delete-then-insert as one
    /// transaction); the sidecar is the single source of truth per sync.
    pub async fn replace_tags(&self, gallery_id: i64, tags: &[Tag]) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../../queries/delete_tags.sql"))
            .bind(gallery_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for tag in tags {
            sqlx::query(include_str!("../../queries/insert_tag.sql"))
                .bind(gallery_id)
                .bind(&tag.category)
                .bind(&tag.value)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn list_tags(&self, gallery_id: i64) -> Result<Vec<Tag>> {
        let rows: Vec<(String, String)> = sqlx::query_as(include_str!("../../queries/list_tags.sql"))
            .bind(gallery_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(|(category, value)| Tag::new(category, value)).collect())
    }

    /// Delete everything belonging to a gallery, children before parent.
    ///
    /// Each statement is its own unit of progress: if one fails, rerunning
    /// the whole deletion later resumes where it stopped (the removal
    /// queue relies on this).
    #[instrument(skip(self))]
    pub async fn delete_by_name(&self, name: &str) -> Result<()> {
        for statement in [
            include_str!("../../queries/delete_gallery_file_hashes.sql"),
            include_str!("../../queries/delete_gallery_files.sql"),
            include_str!("../../queries/delete_gallery_tags.sql"),
            include_str!("../../queries/delete_gallery.sql"),
        ] {
            sqlx::query(statement).bind(name).execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        }
        tracing::info!(gallery = name, "gallery rows deleted");
        Ok(())
    }
}

fn raise_for_gallery(
    result: std::result::Result<SqliteQueryResult, sqlx::Error>,
    name: &str,
) -> Result<SqliteQueryResult> {
    result.or_else(|error| {
        let unique_violation = error
            .as_database_error()
            .is_some_and(|db| db.kind() == sqlx::error::ErrorKind::UniqueViolation);
        if unique_violation {
            Err(error).or_raise(|| ErrorKind::Conflict(name.to_string()))
        } else {
            Err(error).or_raise(|| ErrorKind::Database)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;
    use std::path::PathBuf;
    use time::OffsetDateTime;
    use time::macros::datetime;

    fn fixture_info(name: &str, gid: u64) -> GalleryInfo {
        GalleryInfo {
            folder: PathBuf::from(format!("/download/{name}")),
            name: name.to_string(),
            gid,
            title: "Title".to_string(),
            upload_account: "pooh".to_string(),
            upload_time: datetime!(2024-03-01 17:20:05),
            download_time: datetime!(2024-03-02 09:00:00),
            modified_time: OffsetDateTime::UNIX_EPOCH,
            comment: String::new(),
            tags: vec![Tag::new("artist", "alice"), Tag::new("", "group")],
            files: vec!["001.jpg".to_string(), "002.jpg".to_string(), "galleryinfo.txt".to_string()],
        }
    }

    #[tokio::test]
    async fn test_upsert_roundtrip() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Galleries::from(&db);
        let id = repo.upsert_gallery(&fixture_info("[G][Title][100]", 100)).await.unwrap();
        let record = repo.get_by_name("[G][Title][100]").await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.gid, 100);
        assert_eq!(record.upload_time.unix_timestamp(), datetime!(2024-03-01 17:20:05).assume_utc().unix_timestamp());
    }

    #[tokio::test]
    async fn test_unchanged_upsert_touches_no_rows() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Galleries::from(&db);
        let info = fixture_info("[G][Title][100]", 100);
        let first_id = repo.upsert_gallery(&info).await.unwrap();
        let first = repo.get_by_name(&info.name).await.unwrap().unwrap();
        let second_id = repo.upsert_gallery(&info).await.unwrap();
        let second = repo.get_by_name(&info.name).await.unwrap().unwrap();
        assert_eq!(first_id, second_id);
        // Unchanged metadata leaves the row untouched, access time included.
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_changed_title_updates_row() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Galleries::from(&db);
        let mut info = fixture_info("[G][Title][100]", 100);
        let id = repo.upsert_gallery(&info).await.unwrap();
        info.title = "Retitled".to_string();
        assert_eq!(repo.upsert_gallery(&info).await.unwrap(), id);
        assert_eq!(repo.get_by_name(&info.name).await.unwrap().unwrap().title, "Retitled");
    }

    #[tokio::test]
    async fn test_gid_collision_is_a_conflict() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Galleries::from(&db);
        repo.upsert_gallery(&fixture_info("[first][100]", 100)).await.unwrap();
        let error = repo.upsert_gallery(&fixture_info("[second][100]", 100)).await.unwrap_err();
        assert!(matches!(error.deref(), ErrorKind::Conflict(name) if name == "[second][100]"));
    }

    #[tokio::test]
    async fn test_files_carry_full_digest_sets() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Galleries::from(&db);
        let id = repo.upsert_gallery(&fixture_info("[G][Title][100]", 100)).await.unwrap();
        repo.upsert_file(id, "001.jpg", &koma_hash::hash_bytes(b"page one")).await.unwrap();
        repo.upsert_file(id, "002.jpg", &koma_hash::hash_bytes(b"page two")).await.unwrap();

        let files = repo.list_files(id).await.unwrap();
        assert_eq!(files.len(), 2);
        for algorithm in Algorithm::ALL {
            let digests = repo.file_digests(id, algorithm).await.unwrap();
            assert_eq!(digests.len(), 2, "missing {algorithm} digests");
        }
        let sha512 = repo.file_digests(id, Algorithm::Sha512).await.unwrap();
        assert_eq!(sha512[0].1, koma_hash::hash_bytes(b"page one").comparison());
    }

    #[tokio::test]
    async fn test_retain_files_drops_missing_members() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Galleries::from(&db);
        let id = repo.upsert_gallery(&fixture_info("[G][Title][100]", 100)).await.unwrap();
        repo.upsert_file(id, "001.jpg", &koma_hash::hash_bytes(b"one")).await.unwrap();
        repo.upsert_file(id, "002.jpg", &koma_hash::hash_bytes(b"two")).await.unwrap();
        let dropped = repo.retain_files(id, &["001.jpg".to_string()]).await.unwrap();
        assert_eq!(dropped, 1);
        let files = repo.list_files(id).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "001.jpg");
    }

    #[tokio::test]
    async fn test_tags_are_replaced_wholesale() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Galleries::from(&db);
        let info = fixture_info("[G][Title][100]", 100);
        let id = repo.upsert_gallery(&info).await.unwrap();
        repo.replace_tags(id, &info.tags).await.unwrap();
        assert_eq!(repo.list_tags(id).await.unwrap().len(), 2);

        repo.replace_tags(id, &[Tag::new("artist", "bob")]).await.unwrap();
        assert_eq!(repo.list_tags(id).await.unwrap(), vec![Tag::new("artist", "bob")]);
    }

    #[tokio::test]
    async fn test_sidecar_digest_lookup() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Galleries::from(&db);
        let info = fixture_info("[G][Title][100]", 100);
        let id = repo.upsert_gallery(&info).await.unwrap();
        assert_eq!(repo.sidecar_digest(&info.name).await.unwrap(), None);
        let digests = koma_hash::hash_bytes(b"Title: Title\n");
        repo.upsert_file(id, koma_sidecar::SIDECAR_FILE_NAME, &digests).await.unwrap();
        assert_eq!(repo.sidecar_digest(&info.name).await.unwrap().as_deref(), Some(digests.comparison()));
    }

    #[tokio::test]
    async fn test_delete_by_name_removes_every_row() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Galleries::from(&db);
        let info = fixture_info("[G][Title][100]", 100);
        let id = repo.upsert_gallery(&info).await.unwrap();
        repo.upsert_file(id, "001.jpg", &koma_hash::hash_bytes(b"one")).await.unwrap();
        repo.replace_tags(id, &info.tags).await.unwrap();

        repo.delete_by_name(&info.name).await.unwrap();

        assert_eq!(repo.lookup_id(&info.name).await.unwrap(), None);
        assert!(repo.list_files(id).await.unwrap().is_empty());
        assert!(repo.list_tags(id).await.unwrap().is_empty());
        let hashes: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM file_hashes").fetch_one(db.pool()).await.unwrap();
        assert_eq!(hashes.0, 0);
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Galleries::from(&db);
        let first = repo.upsert_gallery(&fixture_info("[a][1]", 1)).await.unwrap();
        repo.delete_by_name("[a][1]").await.unwrap();
        let second = repo.upsert_gallery(&fixture_info("[b][2]", 2)).await.unwrap();
        assert!(second > first, "AUTOINCREMENT must not recycle {first}");
    }
}
