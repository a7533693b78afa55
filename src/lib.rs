//! git-tfs-bridge: move TFS changeset history into git.
//!
//! Every TFS changeset becomes one git commit with the original author,
//! date and comment, and the git tree matches the TFS working copies at
//! each step.
//!
//! # Architecture
//!
//! - **History**: parse `tf history` output into changeset records
//! - **Timeline**: page through each sub-repository's history and join them by changeset id
//! - **Snapshot**: hash directory trees and diff them
//! - **Replay**: update, diff, copy, commit, one changeset at a time
//! - **Tfs / Git**: the command-line tools behind the [`SourceVcs`] and [`TargetVcs`] traits

mod config;
mod git;
mod history;
mod ignore;
mod locale;
mod replay;
mod repository;
mod snapshot;
mod tfs;
mod timeline;
mod vcs;

#[cfg(test)]
mod testing;

pub use config::{AuthorConfig, Config, HistoryConfig};
pub use git::Git;
pub use history::{ChangesetRecord, parse_history};
pub use ignore::IgnoreRules;
pub use locale::{normalize_date, parse_date};
pub use replay::{
    DeltaStats, Mode, Phase, Replay, Summary, apply_delta, author_identity, commit_message,
};
pub use repository::SubRepository;
pub use snapshot::{Fingerprint, ReconciliationResult, TreeSnapshot, reconcile};
pub use tfs::{DEFAULT_ENCODING, Tf, decode_output, encoding_for_label};
pub use timeline::{Boundary, DEFAULT_PAGE_SIZE, JoinedTimeline, history_from};
pub use vcs::{ChangesetId, SourceVcs, TargetVcs, Version};

/// Error types, one per concern.
pub mod error {
    pub use crate::config::Error as ConfigError;
    pub use crate::ignore::Error as IgnoreError;
    pub use crate::replay::Error as ReplayError;
    pub use crate::vcs::Error as VcsError;
}
