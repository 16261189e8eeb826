//! One full synchronization pass, drive-by-drive.

use crate::discover::discover_galleries;
use crate::error::{ErrorKind, Result};
use crate::notify::LibraryNotifier;
use crate::report::{Failure, PassReport};
use exn::ResultExt;
use futures::StreamExt;
use koma_archive::{BuildOutcome, BuildRequest, Grouping, SortKey};
use koma_catalog::{Builds, Database, Galleries, Removals};
use koma_sidecar::{GalleryInfo, SIDECAR_FILE_NAME};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Everything a pass needs to know, resolved by the caller from its
/// configuration layer.
#[derive(Debug, Clone)]
pub struct PassOptions {
    /// Root the download client writes gallery folders into.
    pub download_root: PathBuf,
    /// Where archives are published; `None` disables archiving entirely.
    pub archive_root: Option<PathBuf>,
    pub grouping: Grouping,
    pub sort: SortKey,
    pub max_image_dimension: u32,
    /// Upper bound on gallery units in flight at once.
    pub workers: usize,
}

/// Orchestrates one pass: drain the removal queue, discover folders,
/// reconcile each gallery against the catalog, build archives, clean up,
/// and report.
///
/// Gallery units run concurrently under a bounded worker pool, but each
/// unit (reconcile → archive → record) is strictly sequential and is not
/// interrupted once started; cancellation takes effect at unit boundaries.
/// Discovery deduplicates folder names, so every gallery's rows have
/// exactly one writer per pass.
pub struct SyncEngine {
    galleries: Galleries,
    removals: Removals,
    builds: Builds,
    options: PassOptions,
    notifier: Arc<dyn LibraryNotifier>,
}

enum UnitOutcome {
    Done { name: String, changed: bool, archive: Option<String> },
    Cancelled,
    Failed(Failure),
}

impl SyncEngine {
    pub fn new(db: &Database, options: PassOptions, notifier: Arc<dyn LibraryNotifier>) -> Self {
        Self {
            galleries: Galleries::from(db),
            removals: Removals::from(db),
            builds: Builds::from(db),
            options,
            notifier,
        }
    }

    /// Run one full pass. Always completes with a report; only failures
    /// that make the whole pass meaningless (unreachable catalog, missing
    /// download root) surface as errors.
    #[instrument(skip_all)]
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassReport> {
        let mut report = PassReport::default();

        // Deletions first: a folder removed and re-created between passes
        // must never be half pending-deletion, half freshly inserted.
        self.drain_removal_queue(cancel, &mut report).await?;

        let folders = discover_galleries(&self.options.download_root)?;
        let disk_names: HashSet<String> = folders
            .iter()
            .filter_map(|folder| folder.file_name().map(|name| name.to_string_lossy().into_owned()))
            .collect();

        let galleries = self.parse_candidates(folders, &mut report).await?;

        // Folders cataloged but gone from disk are queued, not deleted:
        // deletion stays a single code path, exercised at the top of the
        // next pass.
        for name in self.galleries.list_names().await.or_raise(|| ErrorKind::Catalog)? {
            if !disk_names.contains(&name) {
                self.removals.enqueue(&name).await.or_raise(|| ErrorKind::Catalog)?;
                report.enqueued_removals.push(name);
            }
        }

        let junk = match self.options.archive_root {
            Some(_) => self.builds.junk_signatures().await.or_raise(|| ErrorKind::Catalog)?,
            None => HashSet::new(),
        };

        let outcomes: Vec<UnitOutcome> = futures::stream::iter(
            galleries.into_iter().map(|info| self.process_unit(info, &junk, cancel)),
        )
        .buffer_unordered(self.options.workers.max(1))
        .collect()
        .await;
        for outcome in outcomes {
            match outcome {
                UnitOutcome::Done { name, changed, archive } => {
                    if let Some(path) = archive {
                        report.archives_built.push(path);
                    }
                    if changed {
                        report.synced.push(name);
                    } else {
                        report.unchanged.push(name);
                    }
                },
                UnitOutcome::Cancelled => report.cancelled += 1,
                UnitOutcome::Failed(failure) => report.failures.push(failure),
            }
        }

        if let Some(archive_root) = self.options.archive_root.clone() {
            let live = disk_names.clone();
            let removed = tokio::task::spawn_blocking(move || {
                koma_archive::remove_stale_archives(&archive_root, &live)
            })
            .await
            .or_raise(|| ErrorKind::Worker)?
            .or_raise(|| ErrorKind::Archive)?;
            report.stale_archives_removed = removed.len();
        }

        if !report.archives_built.is_empty()
            && let Err(error) = self.notifier.refresh_library().await
        {
            // Best effort only: published archives stay published.
            tracing::warn!(%error, "media server notification failed");
        }

        tracing::info!(
            synced = report.synced.len(),
            unchanged = report.unchanged.len(),
            failed = report.failures.len(),
            archives = report.archives_built.len(),
            "pass finished"
        );
        Ok(report)
    }

    /// Drain the pending-removal ledger completely. A failing entry stays
    /// queued (retried next pass) and never blocks its neighbors.
    async fn drain_removal_queue(&self, cancel: &CancellationToken, report: &mut PassReport) -> Result<()> {
        for name in self.removals.pending().await.or_raise(|| ErrorKind::Catalog)? {
            if cancel.is_cancelled() {
                break;
            }
            match self.drain_entry(&name).await {
                Ok(()) => report.drained.push(name),
                Err(error) => {
                    tracing::warn!(gallery = %name, %error, "removal drain failed; entry stays queued");
                    report.drain_failures.push(Failure::new(name, &error));
                },
            }
        }
        Ok(())
    }

    async fn drain_entry(&self, name: &str) -> Result<()> {
        // Children before parent; delete_by_name resumes from wherever a
        // previous attempt stopped.
        self.galleries.delete_by_name(name).await.or_raise(|| ErrorKind::Drain)?;
        if self.galleries.lookup_id(name).await.or_raise(|| ErrorKind::Drain)?.is_some() {
            // Parent row survived: keep the ledger entry.
            exn::bail!(ErrorKind::Drain);
        }
        self.removals.delete(name).await.or_raise(|| ErrorKind::Drain)?;
        Ok(())
    }

    /// Parse every discovered folder, filter tombstoned GIDs and duplicate
    /// names, and order what's left by the configured sort key.
    async fn parse_candidates(&self, folders: Vec<PathBuf>, report: &mut PassReport) -> Result<Vec<GalleryInfo>> {
        let mut galleries: Vec<GalleryInfo> = Vec::new();
        let mut names_seen: HashSet<String> = HashSet::new();
        for folder in folders {
            let label = folder.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
            let info = match koma_sidecar::parse_folder(&folder) {
                Ok(info) => info,
                Err(error) => {
                    tracing::warn!(gallery = %label, %error, "skipping unparseable gallery folder");
                    report.failures.push(Failure::new(label, &error));
                    continue;
                },
            };
            if !names_seen.insert(info.name.clone()) {
                tracing::warn!(gallery = %info.name, "duplicate folder name; keeping the first occurrence");
                report.failures.push(Failure::new(info.name, &"duplicate folder name"));
                continue;
            }
            if self.removals.is_gid_tombstoned(info.gid).await.or_raise(|| ErrorKind::Catalog)? {
                tracing::warn!(gallery = %info.name, gid = info.gid, "GID was removed; readmit it to re-ingest");
                report.skipped_tombstoned.push(info.name);
                continue;
            }
            galleries.push(info);
        }
        self.options.sort.order(&mut galleries);
        Ok(galleries)
    }

    /// One gallery's unit of work: reconcile, then archive. Sequential on
    /// purpose; the archive step reads rows the reconcile step committed.
    async fn process_unit(&self, info: GalleryInfo, junk: &HashSet<String>, cancel: &CancellationToken) -> UnitOutcome {
        if cancel.is_cancelled() {
            return UnitOutcome::Cancelled;
        }
        let changed = match self.reconcile(&info).await {
            Ok(changed) => changed,
            Err(error) => return UnitOutcome::Failed(Failure::new(info.name, &error)),
        };
        match self.build_archive_step(&info, junk).await {
            Ok(archive) => UnitOutcome::Done { name: info.name, changed, archive },
            Err(error) => UnitOutcome::Failed(Failure::new(info.name, &error)),
        }
    }

    /// Bring the catalog rows for one gallery up to date with its folder.
    ///
    /// Change detection hangs off the sidecar file's recorded digest: an
    /// unchanged sidecar means an unchanged gallery and the reconcile is a
    /// no-op (zero writes). A changed gallery is rewritten under a
    /// pending-removal guard entry, so a crash mid-write is repaired by
    /// the next pass's drain instead of leaving half a gallery behind.
    #[instrument(skip_all, fields(gallery = %info.name))]
    async fn reconcile(&self, info: &GalleryInfo) -> Result<bool> {
        let sidecar_digests =
            koma_hash::hash_file(info.folder.join(SIDECAR_FILE_NAME)).await.or_raise(|| ErrorKind::Hash)?;
        let recorded = self.galleries.sidecar_digest(&info.name).await.or_raise(|| ErrorKind::Catalog)?;
        if recorded.as_deref() == Some(sidecar_digests.comparison()) {
            tracing::debug!("gallery unchanged");
            return Ok(false);
        }

        self.removals.enqueue(&info.name).await.or_raise(|| ErrorKind::Catalog)?;
        let gallery_id = self.galleries.upsert_gallery(info).await.or_raise(|| ErrorKind::Catalog)?;
        for name in &info.files {
            let digests = if name == SIDECAR_FILE_NAME {
                sidecar_digests.clone()
            } else {
                koma_hash::hash_file(info.folder.join(name)).await.or_raise(|| ErrorKind::Hash)?
            };
            self.galleries.upsert_file(gallery_id, name, &digests).await.or_raise(|| ErrorKind::Catalog)?;
        }
        self.galleries.retain_files(gallery_id, &info.files).await.or_raise(|| ErrorKind::Catalog)?;
        self.galleries.replace_tags(gallery_id, &info.tags).await.or_raise(|| ErrorKind::Catalog)?;
        self.removals.delete(&info.name).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::info!(files = info.files.len(), "gallery synced");
        Ok(true)
    }

    /// Build and record this gallery's archive, if archiving is enabled.
    /// Returns the published path for fresh builds.
    async fn build_archive_step(&self, info: &GalleryInfo, junk: &HashSet<String>) -> Result<Option<String>> {
        let Some(archive_root) = self.options.archive_root.clone() else {
            return Ok(None);
        };
        let Some(gallery_id) = self.galleries.lookup_id(&info.name).await.or_raise(|| ErrorKind::Catalog)? else {
            // Reconcile just wrote it; a vanished row means someone purged
            // the gallery under us. Nothing to archive.
            return Ok(None);
        };
        let digests: BTreeMap<String, String> = self
            .galleries
            .file_digests(gallery_id, koma_hash::COMPARISON_ALGORITHM)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .into_iter()
            .collect();
        let sidecar_digest = digests.get(SIDECAR_FILE_NAME).cloned().unwrap_or_default();

        let grouping = self.options.grouping;
        let max_image_dimension = self.options.max_image_dimension;
        let junk = junk.clone();
        let info_owned = info.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let request = BuildRequest {
                info: &info_owned,
                archive_root: &archive_root,
                grouping,
                max_image_dimension,
                junk: &junk,
                digests: &digests,
                sidecar_digest: &sidecar_digest,
            };
            koma_archive::build_archive(&request)
        })
        .await
        .or_raise(|| ErrorKind::Worker)?
        .or_raise(|| ErrorKind::Archive)?;

        match outcome {
            BuildOutcome::Built(built) => {
                let build_id =
                    self.builds.record_build(info.gid, &info.name, &built.members).await.or_raise(|| ErrorKind::Catalog)?;
                let history = self.builds.member_sets(info.gid).await.or_raise(|| ErrorKind::Catalog)?;
                let learned = koma_archive::learn_junk(&history);
                if !learned.is_empty() {
                    tracing::info!(count = learned.len(), "junk signatures learned");
                    self.builds.learn_junk(build_id, &learned).await.or_raise(|| ErrorKind::Catalog)?;
                }
                Ok(Some(built.path.display().to_string()))
            },
            BuildOutcome::UpToDate(_) => Ok(None),
        }
    }
}
