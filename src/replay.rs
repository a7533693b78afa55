//! Replay TFS changesets into git, one commit per changeset.
//!
//! A run moves through [`Phase`]s:
//!
//! - **Preflight**: every source working copy and the target must be clean.
//!   Nothing is touched otherwise.
//! - **Initial import** (optional): the first changeset is materialized in
//!   full, every sub-repository diffed without an affected-path filter.
//! - **Incremental**: every further changeset, in ascending order, is applied
//!   to the sub-repositories that report it, restricted to the paths it
//!   touched.
//!
//! After each commit the target must be clean again; anything else means the
//! commit did not capture what was written and the run stops.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{AuthorConfig, Config};
use crate::history::ChangesetRecord;
use crate::ignore::IgnoreRules;
use crate::repository::SubRepository;
use crate::snapshot::{ReconciliationResult, reconcile};
use crate::timeline::{Boundary, JoinedTimeline};
use crate::vcs::{self, ChangesetId, SourceVcs, TargetVcs, Version};

/// Trailer appended to every imported commit message.
const TRAILER_PREFIX: &str = "git-tfs-bridge: imported from TFS";

/// What kind of run to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Import `changeset` in full as the first commit, then replay everything after it.
    Initial(ChangesetId),
    /// Replay every changeset strictly newer than `changeset`.
    Incremental(ChangesetId),
}

impl Mode {
    pub fn boundary(&self) -> Boundary {
        match *self {
            Mode::Initial(changeset) => Boundary::including(changeset),
            Mode::Incremental(changeset) => Boundary::after(changeset),
        }
    }
}

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Preflight,
    InitialImport,
    Incremental,
    Done,
    Fatal,
}

/// Totals for a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub commits: usize,
    pub files_written: usize,
    pub files_removed: usize,
    /// Files that could not be written or removed and were left as they were.
    pub files_failed: usize,
}

impl Summary {
    fn add(&mut self, delta: &DeltaStats) {
        self.files_written += delta.written;
        self.files_removed += delta.removed;
        self.files_failed += delta.failed;
    }
}

/// Outcome of applying one reconciliation result.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeltaStats {
    pub written: usize,
    pub removed: usize,
    pub failed: usize,
}

/// One sub-repository's part of a changeset.
struct BatchEntry<'r> {
    repository: &'r Arc<SubRepository>,
    /// Restricts the diff to the record's affected paths; `None` compares everything.
    filter: Option<&'r ChangesetRecord>,
}

/// Everything that goes into one target commit.
///
/// All entries are brought to `changeset` before any of them is diffed, and
/// the commit happens only after all of them have been applied.
struct Batch<'r> {
    changeset: ChangesetId,
    entries: Vec<BatchEntry<'r>>,
    /// Supplies the commit's message, author and date.
    metadata: &'r ChangesetRecord,
}

/// Drives a migration run against a source and a target.
pub struct Replay<'a> {
    source: &'a dyn SourceVcs,
    target: &'a dyn TargetVcs,
    repositories: Vec<Arc<SubRepository>>,
    ignore: &'a IgnoreRules,
    author: &'a AuthorConfig,
    page_size: usize,
    phase: Phase,
}

impl<'a> Replay<'a> {
    pub fn new(
        source: &'a dyn SourceVcs,
        target: &'a dyn TargetVcs,
        repositories: Vec<SubRepository>,
        ignore: &'a IgnoreRules,
        config: &'a Config,
    ) -> Self {
        Self {
            source,
            target,
            repositories: repositories.into_iter().map(Arc::new).collect(),
            ignore,
            author: &config.author,
            page_size: config.history.page_size,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Collect the timeline for `mode` without changing anything.
    pub fn timeline(&self, mode: Mode) -> JoinedTimeline {
        JoinedTimeline::build(
            self.source,
            &self.repositories,
            self.ignore,
            mode.boundary(),
            self.page_size,
        )
    }

    /// Perform the run. Ends in [`Phase::Done`] or [`Phase::Fatal`].
    pub fn run(&mut self, mode: Mode) -> Result<Summary, Error> {
        let result = self.run_phases(mode);
        self.phase = match &result {
            Ok(_) => Phase::Done,
            Err(e) => {
                tracing::error!("run stopped: {e}");
                Phase::Fatal
            }
        };
        result
    }

    fn run_phases(&mut self, mode: Mode) -> Result<Summary, Error> {
        self.phase = Phase::Preflight;
        self.preflight()?;

        let timeline = self.timeline(mode);
        tracing::info!(
            "{} changesets to import from {} sub-repositories",
            timeline.len(),
            self.repositories.len()
        );

        let mut summary = Summary::default();
        let mut changesets = timeline.iter();

        if let Mode::Initial(_) = mode {
            if let Some((changeset, records)) = changesets.next() {
                self.phase = Phase::InitialImport;
                let batch = self.initial_batch(changeset, records);
                self.apply_batch(&batch, &mut summary)?;
            }
        }

        self.phase = Phase::Incremental;
        for (changeset, records) in changesets {
            let batch = Self::incremental_batch(changeset, records);
            self.apply_batch(&batch, &mut summary)?;
        }

        tracing::info!(
            "imported {} commits: {} files written, {} removed, {} failed",
            summary.commits,
            summary.files_written,
            summary.files_removed,
            summary.files_failed
        );
        Ok(summary)
    }

    /// Refuse to start unless every working copy is clean.
    fn preflight(&self) -> Result<(), Error> {
        for repo in &self.repositories {
            let path = repo.local_path();
            let clean = self.source.is_clean(path).map_err(|e| Error::Status {
                path: path.display().to_string(),
                source: e,
            })?;
            if !clean {
                return Err(Error::DirtySource(path.display().to_string()));
            }
        }

        let root = self.target.root();
        let clean = self.target.is_clean().map_err(|e| Error::Status {
            path: root.display().to_string(),
            source: e,
        })?;
        if !clean {
            return Err(Error::DirtyTarget(root.display().to_string()));
        }
        Ok(())
    }

    /// Every sub-repository, compared in full.
    fn initial_batch<'r>(
        &'r self,
        changeset: ChangesetId,
        records: &'r [ChangesetRecord],
    ) -> Batch<'r> {
        Batch {
            changeset,
            entries: self
                .repositories
                .iter()
                .map(|repository| BatchEntry {
                    repository,
                    filter: None,
                })
                .collect(),
            metadata: &records[0],
        }
    }

    /// The sub-repositories that report `changeset`, each limited to its affected paths.
    fn incremental_batch(changeset: ChangesetId, records: &[ChangesetRecord]) -> Batch<'_> {
        Batch {
            changeset,
            entries: records
                .iter()
                .map(|record| BatchEntry {
                    repository: &record.repository,
                    filter: Some(record),
                })
                .collect(),
            metadata: &records[0],
        }
    }

    fn apply_batch(&self, batch: &Batch<'_>, summary: &mut Summary) -> Result<(), Error> {
        tracing::info!(
            "C{} ({} sub-repositories): {}",
            batch.changeset,
            batch.entries.len(),
            batch.metadata.comment.lines().next().unwrap_or("")
        );

        for entry in &batch.entries {
            let path = entry.repository.local_path();
            self.source
                .update(path, Version::Changeset(batch.changeset))
                .map_err(|e| Error::Update {
                    path: path.display().to_string(),
                    changeset: batch.changeset,
                    source: e,
                })?;
        }

        for entry in &batch.entries {
            let source_dir = entry.repository.local_path();
            let target_dir = self.target.root().join(entry.repository.name());
            let delta = match entry.filter {
                Some(record) => {
                    let affected = |path: &Path| record.is_affected(path);
                    reconcile(&target_dir, source_dir, self.ignore, Some(&affected))
                }
                None => reconcile(&target_dir, source_dir, self.ignore, None),
            };
            tracing::debug!(
                "{}: {} removed, {} added, {} changed",
                entry.repository.name().to_string_lossy(),
                delta.left_only.len(),
                delta.right_only.len(),
                delta.differing.len()
            );
            summary.add(&apply_delta(&delta, source_dir, &target_dir));
        }

        self.commit(batch)?;
        summary.commits += 1;
        Ok(())
    }

    fn commit(&self, batch: &Batch<'_>) -> Result<(), Error> {
        let changeset = batch.changeset;
        self.target
            .stage_all()
            .map_err(|e| Error::Stage { changeset, source: e })?;

        let record = batch.metadata;
        self.target
            .commit(
                &commit_message(record),
                &author_identity(&record.author, self.author),
                record.timestamp,
            )
            .map_err(|e| Error::Commit { changeset, source: e })?;

        let clean = self.target.is_clean().map_err(|e| Error::Status {
            path: self.target.root().display().to_string(),
            source: e,
        })?;
        if !clean {
            return Err(Error::NotCleanAfterCommit(changeset));
        }
        Ok(())
    }
}

/// Make `target_dir` match `source_dir` for the paths in `delta`.
///
/// Left-only files are removed; right-only and differing files are copied
/// over, creating folders as needed. A file that cannot be handled is logged
/// and counted as failed; the rest of the delta is still applied.
pub fn apply_delta(delta: &ReconciliationResult, source_dir: &Path, target_dir: &Path) -> DeltaStats {
    let mut stats = DeltaStats::default();

    for path in &delta.left_only {
        let target = target_dir.join(path);
        match fs::remove_file(&target) {
            Ok(()) => stats.removed += 1,
            Err(e) => {
                tracing::warn!("failed to remove {}: {e}", target.display());
                stats.failed += 1;
            }
        }
    }

    for path in delta.right_only.iter().chain(&delta.differing) {
        match copy_file(&source_dir.join(path), &target_dir.join(path)) {
            Ok(()) => stats.written += 1,
            Err(e) => {
                tracing::warn!("failed to copy {}: {e}", path.display());
                stats.failed += 1;
            }
        }
    }

    stats
}

fn copy_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to).map(drop)
}

/// The record's comment followed by a trailer naming the source changeset.
pub fn commit_message(record: &ChangesetRecord) -> String {
    let trailer = format!("{TRAILER_PREFIX} {}", record.id);
    if record.comment.is_empty() {
        trailer
    } else {
        format!("{}\n\n{trailer}", record.comment)
    }
}

/// `name <name@domain>` for a TFS account, domain prefix removed.
pub fn author_identity(account: &str, author: &AuthorConfig) -> String {
    let name = account
        .strip_prefix(author.domain_prefix.as_str())
        .unwrap_or(account);
    let name = if name.is_empty() { "unknown" } else { name };
    format!("{name} <{name}@{}>", author.email_domain)
}

/// Reasons a run stops.
#[derive(Debug, Error)]
pub enum Error {
    #[error("source working copy '{0}' has pending changes; clean it first")]
    DirtySource(String),

    #[error("target repository '{0}' has uncommitted changes; clean it first")]
    DirtyTarget(String),

    #[error("failed to query status of '{path}'")]
    Status {
        path: String,
        #[source]
        source: vcs::Error,
    },

    #[error("failed to update '{path}' to C{changeset}")]
    Update {
        path: String,
        changeset: ChangesetId,
        #[source]
        source: vcs::Error,
    },

    #[error("failed to stage C{changeset}")]
    Stage {
        changeset: ChangesetId,
        #[source]
        source: vcs::Error,
    },

    #[error("failed to commit C{changeset}")]
    Commit {
        changeset: ChangesetId,
        #[source]
        source: vcs::Error,
    },

    #[error("target is not clean after committing C{0}: the commit did not capture every change on disk")]
    NotCleanAfterCommit(ChangesetId),
}
