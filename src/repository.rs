//! Source sub-repositories: TFS working folders discovered under a common root.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::vcs::SourceVcs;

/// A TFS working copy and the server path mapped onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRepository {
    local_path: PathBuf,
    server_mapping: String,
}

impl SubRepository {
    pub fn new(local_path: impl Into<PathBuf>, server_mapping: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            server_mapping: server_mapping.into(),
        }
    }

    /// Open the working copy at `path`, asking the source VCS for its mapping.
    pub fn open(source: &dyn SourceVcs, path: &Path) -> Result<Self, crate::vcs::Error> {
        let mapping = source.mapping(path)?;
        Ok(Self::new(path, mapping))
    }

    /// Every immediate subdirectory of `root` that is a working copy.
    ///
    /// Directories named in `exclude` are skipped without asking the source
    /// VCS. Results are sorted by directory name so runs are reproducible.
    pub fn discover(
        source: &dyn SourceVcs,
        root: &Path,
        exclude: &[String],
    ) -> std::io::Result<Vec<Self>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if exclude.iter().any(|x| name.as_os_str() == OsStr::new(x)) {
                tracing::debug!("skipping excluded folder {}", entry.path().display());
                continue;
            }
            dirs.push(entry.path());
        }
        dirs.sort();

        let mut repos = Vec::with_capacity(dirs.len());
        for dir in dirs {
            match Self::open(source, &dir) {
                Ok(repo) => {
                    tracing::debug!("{} -> {}", repo.server_mapping, dir.display());
                    repos.push(repo);
                }
                Err(e) => tracing::debug!("not a working copy, skipping {}: {e}", dir.display()),
            }
        }
        Ok(repos)
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn server_mapping(&self) -> &str {
        &self.server_mapping
    }

    /// Folder name the sub-repository occupies under the target root.
    pub fn name(&self) -> &OsStr {
        self.local_path
            .file_name()
            .unwrap_or_else(|| self.local_path.as_os_str())
    }

    /// Translate a server path into a path relative to the working copy.
    ///
    /// Returns `None` for server paths outside the mapping (and for the
    /// mapping root itself).
    pub fn to_local(&self, server_path: &str) -> Option<PathBuf> {
        let rest = server_path
            .strip_prefix(self.server_mapping.as_str())?
            .strip_prefix('/')?;
        let local: PathBuf = rest.split('/').filter(|part| !part.is_empty()).collect();
        if local.as_os_str().is_empty() {
            None
        } else {
            Some(local)
        }
    }
}
