//! Ignore predicate compiled from a `.gitignore`-format file.
//!
//! Supported: blank lines and `#` comments, `!` negation (last matching rule
//! wins), trailing `/` for directory-only rules, leading or embedded `/` for
//! rules anchored at the root, and the usual `*`, `?`, `[...]`, `**` globs.
//! Rules without a slash match a name at any depth.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};

#[derive(Debug)]
struct Rule {
    matcher: GlobMatcher,
    negated: bool,
    dir_only: bool,
}

/// A compiled set of ignore rules. The empty set ignores nothing.
#[derive(Debug, Default)]
pub struct IgnoreRules {
    rules: Vec<Rule>,
}

impl IgnoreRules {
    /// Load rules from `path`. A missing file yields the empty set.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no ignore file at {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    pub fn parse(content: &str) -> Result<Self, Error> {
        let mut rules = Vec::new();
        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (negated, pattern) = match line.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, line.strip_prefix('\\').unwrap_or(line)),
            };
            let (dir_only, pattern) = match pattern.strip_suffix('/') {
                Some(rest) => (true, rest),
                None => (false, pattern),
            };
            if pattern.is_empty() {
                continue;
            }

            let glob = match pattern.strip_prefix('/') {
                Some(anchored) => anchored.to_string(),
                None if pattern.contains('/') => pattern.to_string(),
                None => format!("**/{pattern}"),
            };
            let matcher = GlobBuilder::new(&glob)
                .literal_separator(true)
                .build()
                .map_err(|e| Error::Pattern {
                    pattern: line.to_string(),
                    source: e,
                })?
                .compile_matcher();

            rules.push(Rule {
                matcher,
                negated,
                dir_only,
            });
        }
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether a single entry is ignored, looking at that entry only.
    ///
    /// Used while walking a tree, where ignored directories are pruned
    /// before their contents are visited.
    pub fn matches(&self, relative: &Path, is_dir: bool) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if rule.dir_only && !is_dir {
                continue;
            }
            if rule.matcher.is_match(relative) {
                ignored = !rule.negated;
            }
        }
        ignored
    }

    /// Whether a file path is ignored, either itself or through one of its
    /// parent directories.
    pub fn matches_path(&self, relative: &Path) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        let mut prefix = PathBuf::new();
        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            prefix.push(component);
            let is_dir = components.peek().is_some();
            if self.matches(&prefix, is_dir) {
                return true;
            }
        }
        false
    }
}

/// Errors from loading ignore rules.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read ignore file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ignore pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
