//! TFS operations through the `tf` command-line client.

use std::path::Path;
use std::process::Command;

use encoding_rs::Encoding;

use crate::vcs::{Error, SourceVcs, Version};

/// What `tf status /format:brief` prints for a clean working copy.
const NO_PENDING_CHANGES: &str = "There are no pending changes.";

/// Console code page of a Russian-locale Windows `tf`.
pub const DEFAULT_ENCODING: &str = "windows-1251";

/// Drives the `tf` client. Stateless: every call names the working copy it acts on.
pub struct Tf {
    program: String,
    encoding: &'static Encoding,
}

impl Tf {
    /// A client whose output is in the [`DEFAULT_ENCODING`] code page.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            encoding: encoding_rs::WINDOWS_1251,
        }
    }

    /// Decode output with `encoding` instead of the default code page.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Run `tf` and capture its stdout as text in the client's code page.
    fn run_output(&self, args: &[&str]) -> Result<String, Error> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| Error::Exec(format!("tf {}: {e}", args.first().unwrap_or(&""))))?;

        if output.status.success() {
            Ok(decode_output(&output.stdout, self.encoding))
        } else {
            let stderr = decode_output(&output.stderr, self.encoding);
            Err(Error::Failed(format!(
                "tf {}: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            )))
        }
    }
}

impl SourceVcs for Tf {
    fn update(&self, path: &Path, version: Version) -> Result<(), Error> {
        let path = path.to_string_lossy();
        let mut args = vec!["get", path.as_ref(), "/recursive", "/noprompt", "/overwrite"];
        let version_arg = version_spec(version);
        if let Some(v) = &version_arg {
            args.push(v.as_str());
        }
        self.run_output(&args).map(drop)
    }

    fn history(&self, path: &Path, from: Version, max_count: usize) -> Result<String, Error> {
        let path = path.to_string_lossy();
        let stop_after = format!("/stopafter:{max_count}");
        let mut args = vec![
            "history",
            path.as_ref(),
            "/recursive",
            "/noprompt",
            "/format:Detailed",
            stop_after.as_str(),
        ];
        let version_arg = version_spec(from);
        if let Some(v) = &version_arg {
            args.push(v.as_str());
        }
        self.run_output(&args)
    }

    fn is_clean(&self, path: &Path) -> Result<bool, Error> {
        let path = path.to_string_lossy();
        let output =
            self.run_output(&["status", path.as_ref(), "/recursive", "/format:brief"])?;
        Ok(output.trim() == NO_PENDING_CHANGES)
    }

    fn mapping(&self, path: &Path) -> Result<String, Error> {
        let path_str = path.to_string_lossy();
        let output = self.run_output(&["workfold", path_str.as_ref()])?;
        parse_workfold(&output).ok_or_else(|| Error::NotAWorkingCopy {
            tool: "tf",
            path: path.display().to_string(),
        })
    }
}

/// Convert console output to text. Unmappable bytes become U+FFFD.
pub fn decode_output(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!("tf output is not valid {}", encoding.name());
    }
    text.into_owned()
}

/// Look up a code page by its WHATWG label (`windows-1251`, `cp866`, `utf-8`).
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// `/version:C<n>` for a specific changeset, nothing for the latest.
fn version_spec(version: Version) -> Option<String> {
    match version {
        Version::Changeset(id) if id > 0 => Some(format!("/version:{version}")),
        _ => None,
    }
}

/// Extract the server path from `tf workfold` output.
///
/// The mapping line looks like ` $/Project/Main/Common: D:\Projects\Main\Common`.
fn parse_workfold(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.starts_with(" $"))
        .and_then(|line| line.split_once(": "))
        .map(|(server, _)| server.trim().to_string())
        .filter(|server| !server.is_empty())
}
