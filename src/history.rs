//! Parsing of `tf history /format:Detailed` output.
//!
//! A detailed log is a sequence of blocks separated by a rule of dashes:
//!
//! ```text
//! -----------------------------------------------------------------
//! Changeset: 105
//! User: DOMAIN\jdoe
//! Date: 15 марта 2016 г. 14:22:10
//!
//! Comment:
//!   Fix the report header
//!
//! Items:
//!   edit $/Proj/Main/Common/Reports/Header.cs
//!
//! Check-in Notes:
//!   Code Reviewer:
//! ```
//!
//! Blocks come newest first. Each one becomes a [`ChangesetRecord`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::ignore::IgnoreRules;
use crate::locale;
use crate::repository::SubRepository;
use crate::vcs::ChangesetId;

const DELIMITER: &str = "------------------------------";
const CHANGESET_LABEL: &str = "Changeset:";
const USER_LABEL: &str = "User:";
const DATE_LABEL: &str = "Date:";
const COMMENT_MARKER: &str = "Comment:";
const ITEMS_MARKER: &str = "Items:";
/// Indentation of comment and item lines.
const INDENT: &str = "  ";
/// Introduces the server path on an item line (`edit $/...`).
const PATH_MARKER: &str = " $";

/// One changeset as reported by one sub-repository.
#[derive(Debug, Clone)]
pub struct ChangesetRecord {
    /// Never zero.
    pub id: ChangesetId,
    /// Raw account name, possibly with a `DOMAIN\` prefix.
    pub author: String,
    pub comment: String,
    /// `None` when the date could not be parsed.
    pub timestamp: Option<DateTime<Local>>,
    /// Working-copy relative paths touched by the changeset.
    pub affected_paths: Vec<PathBuf>,
    pub repository: Arc<SubRepository>,
}

impl ChangesetRecord {
    /// Whether `path` was touched by this changeset, directly or through an
    /// affected folder containing it.
    pub fn is_affected(&self, path: &Path) -> bool {
        self.affected_paths
            .iter()
            .any(|affected| path.starts_with(affected))
    }
}

impl fmt::Display for ChangesetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{} ", self.id)?;
        match &self.timestamp {
            Some(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S"))?,
            None => f.write_str("(no date)")?,
        }
        writeln!(
            f,
            " {} [{}]",
            self.author,
            self.repository.name().to_string_lossy()
        )?;
        for line in self.comment.lines() {
            writeln!(f, "    {line}")?;
        }
        for path in &self.affected_paths {
            writeln!(f, "  {}", path.display())?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Section {
    #[default]
    Header,
    Comment,
    Items,
    /// Check-in notes and policy warnings; nothing we keep.
    Trailer,
}

/// Fields of the block being read.
#[derive(Default)]
struct PendingRecord {
    id: ChangesetId,
    author: String,
    timestamp: Option<DateTime<Local>>,
    date_seen: bool,
    comment_seen: bool,
    comment: String,
    affected_paths: Vec<PathBuf>,
    section: Section,
}

impl PendingRecord {
    fn header_line(&mut self, line: &str) {
        if let Some(value) = line.strip_prefix(CHANGESET_LABEL) {
            if self.id == 0 {
                self.id = value.trim().parse().unwrap_or(0);
            }
        } else if let Some(value) = line.strip_prefix(USER_LABEL) {
            if self.author.is_empty() {
                self.author = value.trim().to_string();
            }
        } else if let Some(value) = line.strip_prefix(DATE_LABEL) {
            if !self.date_seen {
                self.date_seen = true;
                self.timestamp = locale::parse_date(value);
            }
        } else if line == COMMENT_MARKER && !self.comment_seen {
            self.comment_seen = true;
            self.section = Section::Comment;
        } else if line == ITEMS_MARKER {
            self.section = Section::Items;
        }
    }

    fn comment_line(&mut self, line: &str) {
        if line == ITEMS_MARKER {
            self.section = Section::Items;
        } else {
            self.comment.push_str(line.strip_prefix(INDENT).unwrap_or(line));
            self.comment.push('\n');
        }
    }

    fn item_line(&mut self, line: &str, repository: &SubRepository, ignore: &IgnoreRules) {
        if line.is_empty() {
            self.section = Section::Trailer;
            return;
        }
        let Some(path) = item_path(line, repository) else {
            return;
        };
        if ignore.matches_path(&path) {
            tracing::trace!("ignored item {}", path.display());
        } else {
            self.affected_paths.push(path);
        }
    }

    /// The finished record, or `None` if no changeset id was captured.
    fn finish(self, repository: &Arc<SubRepository>) -> Option<ChangesetRecord> {
        (self.id != 0).then(|| ChangesetRecord {
            id: self.id,
            author: self.author,
            comment: self.comment.trim().to_string(),
            timestamp: self.timestamp,
            affected_paths: self.affected_paths,
            repository: Arc::clone(repository),
        })
    }
}

fn is_delimiter(line: &str) -> bool {
    line.starts_with(DELIMITER) && line.ends_with(DELIMITER)
}

/// Working-copy relative path named by an item line, if it lies under the mapping.
fn item_path(line: &str, repository: &SubRepository) -> Option<PathBuf> {
    let line = line.strip_prefix(INDENT).unwrap_or(line);
    let start = line.find(PATH_MARKER)? + 1;
    let server_path = &line[start..];
    // `$/path;X123` carries a deletion id after the separator
    let server_path = server_path.split(';').next().unwrap_or(server_path);
    repository.to_local(server_path)
}

/// Parse detailed history text into records, newest first.
///
/// `expected` is the number of records requested from `tf`; truncated or
/// malformed logs yield fewer records, never an error. Item paths outside
/// the repository's mapping or matched by `ignore` are dropped.
pub fn parse_history(
    text: &str,
    repository: &Arc<SubRepository>,
    ignore: &IgnoreRules,
    expected: usize,
) -> Vec<ChangesetRecord> {
    let mut records = Vec::with_capacity(expected);
    let mut pending = PendingRecord::default();

    for line in text.lines() {
        if is_delimiter(line) {
            records.extend(std::mem::take(&mut pending).finish(repository));
            continue;
        }
        match pending.section {
            Section::Header => pending.header_line(line),
            Section::Comment => pending.comment_line(line),
            Section::Items => pending.item_line(line, repository, ignore),
            Section::Trailer => {}
        }
    }
    records.extend(pending.finish(repository));

    if records.len() < expected {
        tracing::trace!("parsed {} of {expected} requested records", records.len());
    }
    records
}
