//! Git repository operations.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Local};

use crate::vcs::{Error, TargetVcs};

/// A git working tree that imported changesets are committed into.
pub struct Git {
    program: String,
    root: PathBuf,
}

impl Git {
    /// Open the git working tree at `root`.
    ///
    /// `root` does not have to be the top level of the repository; imported
    /// sub-repositories land in folders directly below it.
    pub fn open(program: &str, root: &Path) -> Result<Self, Error> {
        if !root.is_dir() {
            return Err(Error::NotAWorkingCopy {
                tool: "git",
                path: root.display().to_string(),
            });
        }

        let output = Command::new(program)
            .args(["rev-parse", "--git-dir"])
            .current_dir(root)
            .output()
            .map_err(|e| Error::Exec(format!("{program} rev-parse: {e}")))?;

        if !output.status.success() {
            return Err(Error::NotAWorkingCopy {
                tool: "git",
                path: root.display().to_string(),
            });
        }

        Ok(Self {
            program: program.to_string(),
            root: root.to_path_buf(),
        })
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Run a git command that produces no output we care about.
    fn run(&self, args: &[&str]) -> Result<(), Error> {
        self.run_output(args).map(drop)
    }

    /// Run a git command and capture its stdout.
    fn run_output(&self, args: &[&str]) -> Result<String, Error> {
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::Exec(format!("git {}: {e}", args.first().unwrap_or(&""))))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::Failed(format!(
                "git {}: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )))
        }
    }
}

impl TargetVcs for Git {
    fn root(&self) -> &Path {
        &self.root
    }

    /// Clean means `git status --porcelain` reports nothing, untracked files included.
    fn is_clean(&self) -> Result<bool, Error> {
        let status = self.run_output(&["status", "--porcelain"])?;
        Ok(status.trim().is_empty())
    }

    fn stage_all(&self) -> Result<(), Error> {
        self.run(&["add", "-A"])
    }

    fn commit(
        &self,
        message: &str,
        author: &str,
        timestamp: Option<DateTime<Local>>,
    ) -> Result<(), Error> {
        let author = format!("--author={author}");
        let date = timestamp.map(|t| format!("--date={}", t.to_rfc3339()));

        // A changeset that changed nothing visible still gets its own commit.
        let mut args = vec!["commit", "--allow-empty", "--quiet", "-m", message, author.as_str()];
        if let Some(date) = &date {
            args.push(date.as_str());
        }
        self.run(&args)
    }
}
