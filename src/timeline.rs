//! Joining the histories of several sub-repositories into one timeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::history::{ChangesetRecord, parse_history};
use crate::ignore::IgnoreRules;
use crate::repository::SubRepository;
use crate::vcs::{ChangesetId, SourceVcs, Version};

/// Number of records requested per `tf history` call.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// The oldest changeset a run is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub changeset: ChangesetId,
    /// Whether `changeset` itself belongs to the run.
    pub inclusive: bool,
}

impl Boundary {
    /// Everything from `changeset` on, `changeset` included.
    pub fn including(changeset: ChangesetId) -> Self {
        Self {
            changeset,
            inclusive: true,
        }
    }

    /// Everything strictly newer than `changeset`.
    pub fn after(changeset: ChangesetId) -> Self {
        Self {
            changeset,
            inclusive: false,
        }
    }

    pub fn admits(&self, id: ChangesetId) -> bool {
        id > self.changeset || (self.inclusive && id == self.changeset)
    }
}

/// Every record of `repository` admitted by `boundary`, newest first.
///
/// History is fetched a page at a time, walking backwards from the latest
/// changeset until a page reaches the boundary. A failed query ends the walk
/// with whatever has been collected so far.
pub fn history_from(
    source: &dyn SourceVcs,
    repository: &Arc<SubRepository>,
    ignore: &IgnoreRules,
    boundary: Boundary,
    page_size: usize,
) -> Vec<ChangesetRecord> {
    let mut result = Vec::new();
    let mut cursor = Version::Latest;

    loop {
        let text = match source.history(repository.local_path(), cursor, page_size) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    "history query for {} at {cursor} failed: {e}",
                    repository.local_path().display()
                );
                break;
            }
        };
        let page = parse_history(&text, repository, ignore, page_size);
        tracing::debug!(
            "{}: {} records at {cursor}",
            repository.local_path().display(),
            page.len()
        );

        let (Some(newest), Some(oldest)) = (page.first().map(|r| r.id), page.last().map(|r| r.id))
        else {
            break;
        };
        if !boundary.admits(newest) {
            break;
        }
        if !boundary.admits(oldest) {
            result.extend(page.into_iter().take_while(|r| boundary.admits(r.id)));
            break;
        }

        let next = oldest - 1;
        let advances = match cursor {
            Version::Latest => true,
            Version::Changeset(previous) => next < previous,
        };
        result.extend(page);
        // Version 0 would mean "latest" again.
        if next == 0 || !advances {
            break;
        }
        cursor = Version::Changeset(next);
    }

    result
}

/// Changesets of all sub-repositories, keyed and ordered by id.
///
/// Each id maps to one record per sub-repository that reported it, in
/// sub-repository order.
#[derive(Debug, Default)]
pub struct JoinedTimeline {
    changesets: BTreeMap<ChangesetId, Vec<ChangesetRecord>>,
}

impl JoinedTimeline {
    /// Query every sub-repository and join the results.
    pub fn build(
        source: &dyn SourceVcs,
        repositories: &[Arc<SubRepository>],
        ignore: &IgnoreRules,
        boundary: Boundary,
        page_size: usize,
    ) -> Self {
        Self::join(
            repositories
                .iter()
                .flat_map(|repo| history_from(source, repo, ignore, boundary, page_size)),
        )
    }

    /// Join records from any number of sub-repositories.
    ///
    /// A sub-repository that reports the same id twice is kept once.
    pub fn join(records: impl IntoIterator<Item = ChangesetRecord>) -> Self {
        let mut changesets: BTreeMap<ChangesetId, Vec<ChangesetRecord>> = BTreeMap::new();
        for record in records {
            let entry = changesets.entry(record.id).or_default();
            if entry
                .iter()
                .any(|r| Arc::ptr_eq(&r.repository, &record.repository))
            {
                continue;
            }
            entry.push(record);
        }
        Self { changesets }
    }

    /// Distinct changeset ids, ascending.
    pub fn ids(&self) -> Vec<ChangesetId> {
        self.changesets.keys().copied().collect()
    }

    /// Records sharing `id`; empty if the id is not in the timeline.
    pub fn records(&self, id: ChangesetId) -> &[ChangesetRecord] {
        self.changesets.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(id, records)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (ChangesetId, &[ChangesetRecord])> {
        self.changesets
            .iter()
            .map(|(id, records)| (*id, records.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.changesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changesets.is_empty()
    }
}
