//! Archive-build history and junk signatures.
//!
//! Every published archive is recorded here with the source-content
//! digests of its members, per GID lineage. The junk learner reads the
//! ordered member sets back and writes the signatures it derives; both
//! tables are append-only from the application's point of view.

use crate::Database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::SqlitePool;
use std::collections::HashSet;
use time::UtcDateTime;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct Builds {
    pool: SqlitePool,
}

impl From<&Database> for Builds {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl Builds {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record one published archive and its member digests, returning the
    /// build id.
    #[instrument(skip(self, members), fields(gallery = name, members = members.len()))]
    pub async fn record_build(&self, gid: u64, name: &str, members: &[String]) -> Result<i64> {
        let gid = i64::try_from(gid).or_raise(|| ErrorKind::InvalidData("gid"))?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let build_id: i64 = sqlx::query_scalar(include_str!("../../queries/insert_build.sql"))
            .bind(gid)
            .bind(name)
            .bind(UtcDateTime::now().unix_timestamp())
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for digest in members {
            sqlx::query(include_str!("../../queries/insert_member.sql"))
                .bind(build_id)
                .bind(digest)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(build_id)
    }

    /// Member-set history for one lineage, oldest build first. Input for
    /// the junk learner.
    pub async fn member_sets(&self, gid: u64) -> Result<Vec<Vec<String>>> {
        let gid = i64::try_from(gid).or_raise(|| ErrorKind::InvalidData("gid"))?;
        let build_ids: Vec<i64> = sqlx::query_scalar(include_str!("../../queries/list_builds_for_gid.sql"))
            .bind(gid)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut sets = Vec::with_capacity(build_ids.len());
        for build_id in build_ids {
            let members: Vec<String> = sqlx::query_scalar(include_str!("../../queries/list_members.sql"))
                .bind(build_id)
                .fetch_all(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
            sets.push(members);
        }
        Ok(sets)
    }

    /// Persist learned junk signatures. Existing signatures are left
    /// untouched (learning is monotonic).
    pub async fn learn_junk(&self, build_id: i64, digests: &[String]) -> Result<()> {
        let learned_at = UtcDateTime::now().unix_timestamp();
        for digest in digests {
            sqlx::query(include_str!("../../queries/insert_junk.sql"))
                .bind(digest)
                .bind(build_id)
                .bind(learned_at)
                .execute(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        Ok(())
    }

    /// The full junk exclusion set. Content-addressed: it applies to every
    /// gallery, not just the lineage a signature was learned from.
    pub async fn junk_signatures(&self) -> Result<HashSet<String>> {
        let digests: Vec<String> = sqlx::query_scalar(include_str!("../../queries/list_junk.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(digests.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_member_sets_preserve_build_order() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Builds::from(&db);
        repo.record_build(100, "[g][100]", &["a".into(), "b".into(), "c".into()]).await.unwrap();
        repo.record_build(100, "[g][100]", &["a".into(), "b".into()]).await.unwrap();
        repo.record_build(200, "[other][200]", &["z".into()]).await.unwrap();

        let sets = repo.member_sets(100).await.unwrap();
        assert_eq!(sets, vec![vec!["a", "b", "c"], vec!["a", "b"]]);
    }

    #[tokio::test]
    async fn test_junk_signatures_accumulate() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Builds::from(&db);
        let build_id = repo.record_build(100, "[g][100]", &["a".into()]).await.unwrap();
        repo.learn_junk(build_id, &["c".into()]).await.unwrap();
        repo.learn_junk(build_id, &["c".into(), "d".into()]).await.unwrap();
        let junk = repo.junk_signatures().await.unwrap();
        assert_eq!(junk, HashSet::from(["c".to_string(), "d".to_string()]));
    }
}
