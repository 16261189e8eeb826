//! The pending-removal ledger and the GID tombstone record.
//!
//! A gallery is never deleted inline: its folder name is queued here and
//! the sync engine drains the queue at the start of the next pass, so all
//! multi-table deletion goes through one code path. Tombstones are the
//! operator-facing complement: a tombstoned GID is skipped on sync until
//! explicitly readmitted.

use crate::Database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct Removals {
    pool: SqlitePool,
}

impl From<&Database> for Removals {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl Removals {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Queue a gallery for full deletion. Idempotent.
    #[instrument(skip(self))]
    pub async fn enqueue(&self, name: &str) -> Result<()> {
        sqlx::query(include_str!("../../queries/enqueue_removal.sql"))
            .bind(name)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Queued folder names, oldest first.
    pub async fn pending(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../../queries/list_removals.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub async fn contains(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(include_str!("../../queries/contains_removal.sql"))
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(count > 0)
    }

    /// Drop a queue entry. Only called once every dependent row of the
    /// named gallery is confirmed gone.
    pub async fn delete(&self, name: &str) -> Result<()> {
        sqlx::query(include_str!("../../queries/delete_removal.sql"))
            .bind(name)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Record a GID as intentionally purged; folders carrying it are
    /// skipped on sync from now on. Idempotent, append-only.
    #[instrument(skip(self))]
    pub async fn tombstone_gid(&self, gid: u64) -> Result<()> {
        let gid = i64::try_from(gid).or_raise(|| ErrorKind::InvalidData("gid"))?;
        sqlx::query(include_str!("../../queries/tombstone_gid.sql"))
            .bind(gid)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn is_gid_tombstoned(&self, gid: u64) -> Result<bool> {
        let gid = i64::try_from(gid).or_raise(|| ErrorKind::InvalidData("gid"))?;
        let count: i64 = sqlx::query_scalar(include_str!("../../queries/gid_tombstoned.sql"))
            .bind(gid)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(count > 0)
    }

    /// Operator override: clear a tombstone so the GID can be re-ingested.
    #[instrument(skip(self))]
    pub async fn readmit_gid(&self, gid: u64) -> Result<bool> {
        let gid = i64::try_from(gid).or_raise(|| ErrorKind::InvalidData("gid"))?;
        let result = sqlx::query(include_str!("../../queries/delete_tombstone.sql"))
            .bind(gid)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
