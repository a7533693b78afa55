//! Content snapshots of directory trees and the three-way diff between them.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::ignore::IgnoreRules;

/// Version-control metadata, never descended into or compared.
const METADATA_NAMES: [&str; 5] = [".git", ".gitignore", ".hg", ".hgignore", "$tf"];

/// Content identity of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fingerprint {
    Sha256([u8; 32]),
    /// The file exists but could not be read.
    Unreadable,
}

impl Fingerprint {
    pub fn of_file(path: &Path) -> Self {
        match hash_file(path) {
            Ok(digest) => Fingerprint::Sha256(digest),
            Err(e) => {
                tracing::warn!("cannot read {}: {e}", path.display());
                Fingerprint::Unreadable
            }
        }
    }

    /// Whether two files count as holding the same bytes.
    ///
    /// Unreadable files match each other and nothing else.
    pub fn same_content(&self, other: &Self) -> bool {
        self == other
    }
}

fn hash_file(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().into())
}

/// Root-relative file paths mapped to their fingerprints.
#[derive(Debug, Default, Clone)]
pub struct TreeSnapshot {
    entries: BTreeMap<PathBuf, Fingerprint>,
}

impl TreeSnapshot {
    /// Hash every regular file below `root`.
    ///
    /// Metadata folders and anything matched by `ignore` are skipped without
    /// descending. A missing `root` is an empty tree.
    pub fn capture(root: &Path, ignore: &IgnoreRules) -> Self {
        let mut entries = BTreeMap::new();
        if !root.exists() {
            return Self { entries };
        }

        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if METADATA_NAMES.iter().any(|name| entry.file_name() == *name) {
                    return false;
                }
                match entry.path().strip_prefix(root) {
                    Ok(relative) => !ignore.matches(relative, entry.file_type().is_dir()),
                    Err(_) => true,
                }
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry under {}: {e}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                entries.insert(relative.to_path_buf(), Fingerprint::of_file(entry.path()));
            }
        }

        Self { entries }
    }

    pub fn get(&self, path: &Path) -> Option<&Fingerprint> {
        self.entries.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How two trees differ, path by path.
///
/// The three sets are disjoint. Paths with identical content on both sides
/// appear in none of them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Only in the left tree.
    pub left_only: BTreeSet<PathBuf>,
    /// Only in the right tree.
    pub right_only: BTreeSet<PathBuf>,
    /// In both trees with different content.
    pub differing: BTreeSet<PathBuf>,
}

impl ReconciliationResult {
    /// Compare two snapshots. When `affected` is given, only paths it
    /// accepts are reported.
    pub fn between(
        left: &TreeSnapshot,
        right: &TreeSnapshot,
        affected: Option<&dyn Fn(&Path) -> bool>,
    ) -> Self {
        let wanted = |path: &Path| affected.is_none_or(|accept| accept(path));
        let mut result = Self::default();

        for (path, left_print) in &left.entries {
            if !wanted(path) {
                continue;
            }
            match right.entries.get(path) {
                None => {
                    result.left_only.insert(path.clone());
                }
                Some(right_print) if !left_print.same_content(right_print) => {
                    result.differing.insert(path.clone());
                }
                Some(_) => {}
            }
        }
        for path in right.entries.keys() {
            if wanted(path) && !left.entries.contains_key(path) {
                result.right_only.insert(path.clone());
            }
        }

        result
    }

    pub fn is_empty(&self) -> bool {
        self.left_only.is_empty() && self.right_only.is_empty() && self.differing.is_empty()
    }

    pub fn len(&self) -> usize {
        self.left_only.len() + self.right_only.len() + self.differing.len()
    }
}

/// Snapshot both roots and diff them.
pub fn reconcile(
    left_root: &Path,
    right_root: &Path,
    ignore: &IgnoreRules,
    affected: Option<&dyn Fn(&Path) -> bool>,
) -> ReconciliationResult {
    let left = TreeSnapshot::capture(left_root, ignore);
    let right = TreeSnapshot::capture(right_root, ignore);
    ReconciliationResult::between(&left, &right, affected)
}
