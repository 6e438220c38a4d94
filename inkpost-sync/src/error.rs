//! Error types for inkpost-sync.

use std::path::PathBuf;

use thiserror::Error;

use inkpost_core::{CacheError, RelPath, StoreError};
use inkpost_detector::DetectError;

use crate::remote::RemoteError;

/// Failure to read a local document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid front matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors that stop a drain. The unprocessed remainder has already been
/// checkpointed to the cache when one of these is returned.
#[derive(Debug, Error)]
pub enum DrainError {
    /// Some path is both staged and modified in the work tree.
    #[error("working tree has paths that are both staged and unstaged; stage or revert them first")]
    MixedStatus,

    #[error("change detection failed: {0}")]
    Detect(#[from] DetectError),

    #[error("pending cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("post store error: {0}")]
    Store(#[from] StoreError),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("publishing {path} failed: {source}")]
    Remote {
        path: RelPath,
        #[source]
        source: RemoteError,
    },
}

/// All errors from the commit/push pipelines and the supplemental commands.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Drain(#[from] DrainError),

    #[error("working tree has paths that are both staged and unstaged; stage or revert them first")]
    MixedStatus,

    #[error("cancelled")]
    Declined,

    #[error("change detection failed: {0}")]
    Detect(#[from] DetectError),

    #[error("pending cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("post store error: {0}")]
    Store(#[from] StoreError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Neither a post id nor a known title.
    #[error("no published post matches '{query}'; pass the numeric post id instead")]
    UnknownPost { query: String },

    #[error("{path} has not been published")]
    NotPublished { path: RelPath },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn doc_io(path: impl Into<PathBuf>, source: std::io::Error) -> DocumentError {
    DocumentError::Io {
        path: path.into(),
        source,
    }
}
