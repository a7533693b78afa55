//! Bridge configuration.
//!
//! Everything has a default; a config file only needs the values that
//! differ. Source and target roots come from the command line.
//!
//! ```toml
//! tf_command = "C:/Program Files (x86)/Microsoft Visual Studio 14.0/Common7/IDE/TF.exe"
//! tf_encoding = "windows-1251"
//!
//! [author]
//! domain_prefix = "NT_WORK\\"
//! email_domain = "example.com"
//!
//! [history]
//! page_size = 100
//! exclude = ["AutoScripts"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use encoding_rs::Encoding;

use crate::tfs::{self, DEFAULT_ENCODING};
use crate::timeline::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Executable used for the source VCS
    pub tf_command: String,

    /// Code page of `tf` console output
    pub tf_encoding: String,

    /// Executable used for the target VCS
    pub git_command: String,

    /// Ignore file applied to both trees (default: `<target>/.gitignore`)
    pub ignore_file: Option<PathBuf>,

    pub author: AuthorConfig,

    pub history: HistoryConfig,
}

/// How TFS account names become git identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorConfig {
    /// Literal prefix removed from account names (`DOMAIN\jdoe` -> `jdoe`)
    pub domain_prefix: String,

    /// Domain of the synthesized e-mail address
    pub email_domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Records requested per history query
    pub page_size: usize,

    /// Folder names under the source root that are not sub-repositories
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tf_command: "tf".to_string(),
            tf_encoding: DEFAULT_ENCODING.to_string(),
            git_command: "git".to_string(),
            ignore_file: None,
            author: AuthorConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            domain_prefix: "DOMAIN\\".to_string(),
            email_domain: "example.com".to_string(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            exclude: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a config from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(content)?;
        if config.history.page_size == 0 {
            return Err(Error::Invalid("history.page_size must be at least 1".to_string()));
        }
        config.tf_encoding()?;
        Ok(config)
    }

    /// The code page named by `tf_encoding`.
    pub fn tf_encoding(&self) -> Result<&'static Encoding, Error> {
        tfs::encoding_for_label(&self.tf_encoding)
            .ok_or_else(|| Error::Invalid(format!("unknown tf_encoding '{}'", self.tf_encoding)))
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// The ignore file to use for a given target root.
    pub fn ignore_file_for(&self, target_root: &Path) -> PathBuf {
        self.ignore_file
            .clone()
            .unwrap_or_else(|| target_root.join(".gitignore"))
    }
}

/// Errors from loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.tf_command, "tf");
        assert_eq!(config.git_command, "git");
        assert_eq!(config.tf_encoding().unwrap(), encoding_rs::WINDOWS_1251);
        assert_eq!(config.author.domain_prefix, "DOMAIN\\");
        assert_eq!(config.history.page_size, DEFAULT_PAGE_SIZE);
        assert!(config.history.exclude.is_empty());
        assert_eq!(
            config.ignore_file_for(Path::new("/git/Main")),
            Path::new("/git/Main/.gitignore")
        );
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            ignore_file = "/etc/bridge.ignore"

            [author]
            domain_prefix = "NT_WORK\\"

            [history]
            exclude = ["AutoScripts"]
            "#,
        )
        .unwrap();

        assert_eq!(config.author.domain_prefix, "NT_WORK\\");
        assert_eq!(config.author.email_domain, "example.com");
        assert_eq!(config.history.exclude, ["AutoScripts"]);
        assert_eq!(config.history.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(
            config.ignore_file_for(Path::new("/git/Main")),
            Path::new("/etc/bridge.ignore")
        );
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = Config::from_toml("[history]\npage_size = 0\n").unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn tf_encoding_is_validated() {
        let config = Config::from_toml("tf_encoding = \"cp866\"\n").unwrap();
        assert_eq!(config.tf_encoding().unwrap(), encoding_rs::IBM866);

        let err = Config::from_toml("tf_encoding = \"klingon\"\n").unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        let back = Config::from_toml(&text).unwrap();
        assert_eq!(back.tf_command, config.tf_command);
        assert_eq!(back.author.email_domain, config.author.email_domain);
    }
}
