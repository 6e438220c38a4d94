//! Account and repository configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.inkpost/
//!   config.yaml        (account + notes repository settings)
//! <repo_dir>/
//!   .inkpost/pending.json
//!   .inkpost/posts.db
//! ```
//!
//! Like the rest of the crate, loaders come in two forms: `load_at(home)`
//! with an explicit home directory (used by tests), and `load()` which
//! resolves the home directory itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{config_io, ConfigError};

/// Interval between retries when the remote host throttles us.
pub const DEFAULT_RATE_LIMIT_SECS: u64 = 5;

/// Notes repository location: one path, or one per operating system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoDir {
    Single(PathBuf),
    PerPlatform(BTreeMap<String, PathBuf>),
}

/// Contents of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// XML-RPC endpoint of the blog host.
    pub blog_url: String,
    #[serde(default)]
    pub blog_id: String,
    #[serde(default)]
    pub app_key: String,
    pub username: String,
    pub password: String,
    pub repo_dir: RepoDir,
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    #[serde(default = "default_db_file")]
    pub db_file: PathBuf,
    /// Content extensions tracked for publishing, without the dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Categories prepended to every published post.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_rate_limit_secs")]
    pub rate_limit_secs: u64,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

fn default_cache_file() -> PathBuf {
    PathBuf::from(".inkpost").join("pending.json")
}

fn default_db_file() -> PathBuf {
    PathBuf::from(".inkpost").join("posts.db")
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

fn default_categories() -> Vec<String> {
    vec!["[Markdown]".to_string()]
}

fn default_rate_limit_secs() -> u64 {
    DEFAULT_RATE_LIMIT_SECS
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("inkpost_bak")
}

impl Config {
    /// The notes repository root for the running platform. Must be absolute.
    pub fn repo_root(&self) -> Result<PathBuf, ConfigError> {
        let root = match &self.repo_dir {
            RepoDir::Single(path) => path.clone(),
            RepoDir::PerPlatform(map) => map
                .iter()
                .find(|(os, _)| platform_matches(os))
                .map(|(_, path)| path.clone())
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "repo_dir has no entry for platform '{}'",
                        std::env::consts::OS
                    ))
                })?,
        };
        if !root.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "repo_dir must be an absolute path, got '{}'",
                root.display()
            )));
        }
        Ok(root)
    }

    pub fn cache_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.repo_root()?.join(&self.cache_file))
    }

    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.repo_root()?.join(&self.db_file))
    }

    pub fn download_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.repo_root()?.join(&self.download_dir))
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_secs)
    }
}

fn platform_matches(key: &str) -> bool {
    let os = std::env::consts::OS;
    key.eq_ignore_ascii_case(os) || (os == "macos" && key.eq_ignore_ascii_case("darwin"))
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// `<home>/.inkpost/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".inkpost").join("config.yaml")
}

/// Load the config from an explicit file.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| config_io(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `<home>/.inkpost/config.yaml`.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    load_from(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
