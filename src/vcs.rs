//! Capability interfaces for the two version-control systems.
//!
//! The replay engine never builds command lines itself. It talks to the
//! source (TFS) and the target (git) only through these traits, so the
//! process-spawning wrappers in [`crate::tfs`] and [`crate::git`] can be
//! swapped for anything else that answers the same questions.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Local};

/// A changeset number assigned by the source VCS.
pub type ChangesetId = u32;

/// Which version of a source path to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// The most recent changeset.
    Latest,
    /// A specific changeset.
    Changeset(ChangesetId),
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Latest => f.write_str("latest"),
            Version::Changeset(id) => write!(f, "C{id}"),
        }
    }
}

/// The legacy centralized VCS that history is read from.
pub trait SourceVcs {
    /// Bring the working copy at `path` to `version`.
    fn update(&self, path: &Path, version: Version) -> Result<(), Error>;

    /// Raw detailed history text for `path`, newest first, starting at `from`.
    fn history(&self, path: &Path, from: Version, max_count: usize) -> Result<String, Error>;

    /// Whether the working copy at `path` has no pending changes.
    fn is_clean(&self, path: &Path) -> Result<bool, Error>;

    /// The server path mapped to the working copy at `path`.
    fn mapping(&self, path: &Path) -> Result<String, Error>;
}

/// The git repository that history is written into.
pub trait TargetVcs {
    /// Root of the working tree that receives imported files.
    fn root(&self) -> &Path;

    fn is_clean(&self) -> Result<bool, Error>;

    fn stage_all(&self) -> Result<(), Error>;

    /// Commit whatever is staged. `timestamp` of `None` leaves the date to git.
    fn commit(
        &self,
        message: &str,
        author: &str,
        timestamp: Option<DateTime<Local>>,
    ) -> Result<(), Error>;
}

/// Errors from invoking a VCS tool.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to execute: {0}")]
    Exec(String),

    #[error("not a {tool} working copy: '{path}'")]
    NotAWorkingCopy { tool: &'static str, path: String },

    #[error("{0}")]
    Failed(String),
}
