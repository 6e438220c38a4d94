//! Error types for inkpost-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{DerivedSet, RelPath};

/// One path found in two derived sets of a pending change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub path: RelPath,
    pub first: DerivedSet,
    pub second: DerivedSet,
}

/// A merge produced a path in more than one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictError {
    pub overlaps: Vec<Overlap>,
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending changes overlap across categories:")?;
        for o in &self.overlaps {
            write!(f, " {} ({} & {});", o.path, o.first, o.second)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConflictError {}

/// Errors from the pending-change cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache file exists but is not a `[[..],[..],[..],[..]]` document.
    #[error("failed to parse pending-change cache at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// The confirmation capability declined the write.
    #[error("saving pending changes was declined")]
    Declined,
}

/// Errors from the identifier store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("stored tags are not a JSON list: {0}")]
    Tags(#[from] serde_json::Error),

    /// `key` is `"filepath"` or `"postid"`.
    #[error("duplicate {key} '{value}' in post mapping")]
    DuplicateIdentifier { key: &'static str, value: String },

    #[error("no post mapped at '{path}'")]
    UnknownPath { path: RelPath },

    #[error("{count} posts share the title '{title}'")]
    AmbiguousTitle { title: String, count: usize },
}

/// Errors from loading the YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub(crate) fn cache_io(path: impl Into<PathBuf>, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
