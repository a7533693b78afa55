//! In-memory stand-ins for `tf` and `git`, and helpers for building fixtures.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use walkdir::WalkDir;

use crate::vcs::{ChangesetId, Error, SourceVcs, TargetVcs, Version};

/// Write `(relative path, contents)` pairs below `root`, creating folders.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

/// Every file below `root` as `relative/path -> contents`, `.git` excluded.
pub fn read_tree(root: &Path) -> BTreeMap<String, String> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(root).unwrap();
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            (key, fs::read_to_string(e.path()).unwrap())
        })
        .collect()
}

/// One block of a detailed `tf history` log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: ChangesetId,
    pub user: String,
    pub date: String,
    pub comment: String,
    pub items: Vec<String>,
}

impl LogEntry {
    pub fn new(id: ChangesetId) -> Self {
        Self {
            id,
            user: "DOMAIN\\jdoe".to_string(),
            date: format!("{} марта 2016 г. 10:00:00", id % 28 + 1),
            comment: format!("changeset {id}"),
            items: Vec::new(),
        }
    }

    pub fn user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.date = date.to_string();
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    pub fn items<'a>(mut self, items: impl IntoIterator<Item = &'a str>) -> Self {
        self.items = items.into_iter().map(str::to_string).collect();
        self
    }
}

/// Render entries the way `tf history /format:Detailed` prints them.
pub fn detailed_log(entries: &[LogEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&"-".repeat(79));
        out.push('\n');
        out.push_str(&format!("Changeset: {}\n", entry.id));
        out.push_str(&format!("User: {}\n", entry.user));
        out.push_str(&format!("Date: {}\n\n", entry.date));
        out.push_str("Comment:\n");
        for line in entry.comment.lines() {
            out.push_str(&format!("  {line}\n"));
        }
        out.push_str("\nItems:\n");
        for item in &entry.items {
            out.push_str(&format!("  {item}\n"));
        }
        out.push_str("\nCheck-in Notes:\n  Code Reviewer:\n\n");
    }
    out
}

#[derive(Debug, Clone)]
struct FakeChangeset {
    entry: LogEntry,
    /// Full content of the working copy at this changeset.
    tree: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct FakeRepository {
    mapping: String,
    changesets: BTreeMap<ChangesetId, FakeChangeset>,
    dirty: bool,
    history_fails: bool,
}

/// A TFS server with one working copy per registered path.
///
/// `update` rewrites the working copy on disk to the recorded tree of the
/// newest changeset at or before the requested version.
#[derive(Debug, Default)]
pub struct FakeSource {
    repositories: RefCell<HashMap<PathBuf, FakeRepository>>,
    history_calls: Cell<usize>,
    updates: RefCell<Vec<(PathBuf, Version)>>,
}

impl FakeSource {
    pub fn add_repository(&self, path: &Path, mapping: &str) {
        self.repositories.borrow_mut().insert(
            path.to_path_buf(),
            FakeRepository {
                mapping: mapping.to_string(),
                ..FakeRepository::default()
            },
        );
    }

    /// Record a changeset whose working-copy state is `tree`; items are
    /// derived from the files that differ from the previous changeset.
    pub fn add_changeset(&self, path: &Path, id: ChangesetId, tree: &[(&str, &str)]) {
        let tree: BTreeMap<String, String> = tree
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        self.add_changeset_with(path, LogEntry::new(id), tree);
    }

    pub fn add_changeset_with(
        &self,
        path: &Path,
        mut entry: LogEntry,
        tree: BTreeMap<String, String>,
    ) {
        let mut repos = self.repositories.borrow_mut();
        let repo = repos.get_mut(path).expect("unknown repository");
        if entry.items.is_empty() {
            let previous = repo
                .changesets
                .range(..entry.id)
                .next_back()
                .map(|(_, c)| c.tree.clone())
                .unwrap_or_default();
            let mut touched: Vec<&String> = tree
                .iter()
                .filter(|(p, c)| previous.get(*p) != Some(*c))
                .map(|(p, _)| p)
                .collect();
            touched.extend(previous.keys().filter(|p| !tree.contains_key(*p)));
            entry.items = touched
                .into_iter()
                .map(|p| format!("edit {}/{p}", repo.mapping))
                .collect();
        }
        repo.changesets
            .insert(entry.id, FakeChangeset { entry, tree });
    }

    pub fn set_dirty(&self, path: &Path, dirty: bool) {
        if let Some(repo) = self.repositories.borrow_mut().get_mut(path) {
            repo.dirty = dirty;
        }
    }

    pub fn fail_history(&self, path: &Path) {
        if let Some(repo) = self.repositories.borrow_mut().get_mut(path) {
            repo.history_fails = true;
        }
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.get()
    }

    pub fn updates(&self) -> Vec<(PathBuf, Version)> {
        self.updates.borrow().clone()
    }
}

impl SourceVcs for FakeSource {
    fn update(&self, path: &Path, version: Version) -> Result<(), Error> {
        self.updates.borrow_mut().push((path.to_path_buf(), version));
        let repos = self.repositories.borrow();
        let repo = repos
            .get(path)
            .ok_or_else(|| Error::Failed(format!("no workspace for {}", path.display())))?;
        let upto = match version {
            Version::Latest => ChangesetId::MAX,
            Version::Changeset(id) => id,
        };
        let tree = repo
            .changesets
            .range(..=upto)
            .next_back()
            .map(|(_, c)| c.tree.clone())
            .unwrap_or_default();

        if path.exists() {
            for entry in fs::read_dir(path).map_err(|e| Error::Failed(e.to_string()))? {
                let entry = entry.map_err(|e| Error::Failed(e.to_string()))?;
                if entry.file_name() == "$tf" {
                    continue;
                }
                let result = if entry.path().is_dir() {
                    fs::remove_dir_all(entry.path())
                } else {
                    fs::remove_file(entry.path())
                };
                result.map_err(|e| Error::Failed(e.to_string()))?;
            }
        }
        for (file, contents) in &tree {
            let target = path.join(file);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::Failed(e.to_string()))?;
            }
            fs::write(&target, contents).map_err(|e| Error::Failed(e.to_string()))?;
        }
        Ok(())
    }

    fn history(&self, path: &Path, from: Version, max_count: usize) -> Result<String, Error> {
        self.history_calls.set(self.history_calls.get() + 1);
        let repos = self.repositories.borrow();
        let repo = repos
            .get(path)
            .ok_or_else(|| Error::Failed(format!("no workspace for {}", path.display())))?;
        if repo.history_fails {
            return Err(Error::Failed("TF30063: not authorized".to_string()));
        }
        let upto = match from {
            Version::Latest => ChangesetId::MAX,
            Version::Changeset(id) => id,
        };
        let entries: Vec<LogEntry> = repo
            .changesets
            .range(..=upto)
            .rev()
            .take(max_count)
            .map(|(_, c)| c.entry.clone())
            .collect();
        Ok(detailed_log(&entries))
    }

    fn is_clean(&self, path: &Path) -> Result<bool, Error> {
        let repos = self.repositories.borrow();
        repos
            .get(path)
            .map(|repo| !repo.dirty)
            .ok_or_else(|| Error::Failed(format!("no workspace for {}", path.display())))
    }

    fn mapping(&self, path: &Path) -> Result<String, Error> {
        self.repositories
            .borrow()
            .get(path)
            .map(|repo| repo.mapping.clone())
            .ok_or_else(|| Error::NotAWorkingCopy {
                tool: "tf",
                path: path.display().to_string(),
            })
    }
}

/// A commit as seen by [`FakeTarget`], with the tree it captured.
#[derive(Debug, Clone)]
pub struct FakeCommit {
    pub message: String,
    pub author: String,
    pub timestamp: Option<DateTime<Local>>,
    pub tree: BTreeMap<String, String>,
}

/// A git repository rooted at a real directory that records commits in memory.
#[derive(Debug)]
pub struct FakeTarget {
    root: PathBuf,
    dirty: Cell<bool>,
    dirty_after_commit: Cell<bool>,
    staged: Cell<usize>,
    commits: RefCell<Vec<FakeCommit>>,
}

impl FakeTarget {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            dirty: Cell::new(false),
            dirty_after_commit: Cell::new(false),
            staged: Cell::new(0),
            commits: RefCell::new(Vec::new()),
        }
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.set(dirty);
    }

    /// Simulate changes that staging does not pick up.
    pub fn stay_dirty_after_commit(&self) {
        self.dirty_after_commit.set(true);
    }

    pub fn commits(&self) -> Vec<FakeCommit> {
        self.commits.borrow().clone()
    }

    pub fn stage_count(&self) -> usize {
        self.staged.get()
    }
}

impl TargetVcs for FakeTarget {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_clean(&self) -> Result<bool, Error> {
        Ok(!self.dirty.get())
    }

    fn stage_all(&self) -> Result<(), Error> {
        self.staged.set(self.staged.get() + 1);
        Ok(())
    }

    fn commit(
        &self,
        message: &str,
        author: &str,
        timestamp: Option<DateTime<Local>>,
    ) -> Result<(), Error> {
        self.commits.borrow_mut().push(FakeCommit {
            message: message.to_string(),
            author: author.to_string(),
            timestamp,
            tree: read_tree(&self.root),
        });
        self.dirty.set(self.dirty_after_commit.get());
        Ok(())
    }
}
